//! Waterfall orchestration: threshold, then capital recall, liquidation
//! queue and market sale, each working on the debt the previous one left.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use waterfall_api::{LiquidationQueueQuery, RouteSaleSimulation, VenueRetrievalQuery};

use crate::config::QueryConfig;
use crate::position::SimulationInput;
use crate::result::SimulationResult;
use crate::stages::{CapitalRecallStage, LiquidationQueueStage, MarketSaleStage};
use crate::threshold::liquidation_threshold;

/// Liquidation waterfall simulator.
///
/// Holds only query capabilities; every run reads from the input it is given
/// and shares no state with other runs.
#[derive(Debug, Clone)]
pub struct Simulator {
    capital_recall: CapitalRecallStage,
    liquidation_queue: LiquidationQueueStage,
    market_sale: MarketSaleStage,
}

impl Simulator {
    /// Create a simulator from the three stage capabilities.
    pub fn new(
        venues: Arc<dyn VenueRetrievalQuery>,
        queue: Arc<dyn LiquidationQueueQuery>,
        router: Arc<dyn RouteSaleSimulation>,
        queries: &QueryConfig,
    ) -> Self {
        Self {
            capital_recall: CapitalRecallStage::new(venues, queries.venue_timeout()),
            liquidation_queue: LiquidationQueueStage::new(queue, queries.queue_timeout()),
            market_sale: MarketSaleStage::new(router, queries.route_timeout()),
        }
    }

    /// Run the full waterfall for one snapshot.
    ///
    /// Never fails: stages that cannot be computed report *no-data* and hand
    /// the debt they received to the next stage unchanged.
    #[instrument(skip(self, input), fields(user = %input.user))]
    pub async fn simulate(&self, input: &SimulationInput) -> SimulationResult {
        let position = &input.position;

        let collateral_value = position.collateral_value();
        let threshold = liquidation_threshold(
            collateral_value,
            position.liquidation_ltv,
            position.borrow_ltv,
        );

        let recall = self
            .capital_recall
            .run(&input.user, &position.venues, threshold.liquidated_amount)
            .await;

        let queue = self
            .liquidation_queue
            .run(recall.remaining_after, &position.collateral, &position.credit)
            .await;

        let sale = self
            .market_sale
            .run(queue.remaining_after, &position.collateral, &position.credit.denom)
            .await;

        let final_remainder = sale.remaining_after;

        let result = SimulationResult {
            collateral_value,
            current_ltv: position.current_ltv(),
            threshold: threshold.threshold,
            liquidated_amount: threshold.liquidated_amount,
            stages: [recall, queue, sale],
            final_remainder,
        };

        if result.has_shortfall() {
            warn!(
                user = %input.user,
                shortfall = %final_remainder,
                complete = result.is_complete(),
                "Waterfall leaves debt uncovered"
            );
        }

        info!(
            threshold = %result.threshold,
            liquidated = %result.liquidated_amount,
            recall = result.stages[0].outcome.label(),
            queue = result.stages[1].outcome.label(),
            sale = result.stages[2].outcome.label(),
            remainder = %result.final_remainder,
            "Simulation complete"
        );

        result
    }
}
