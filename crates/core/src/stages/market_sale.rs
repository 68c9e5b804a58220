//! Market sale: last-resort sale of whatever collateral is still held.

use rust_decimal::Decimal;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use waterfall_api::{RouteSaleSimulation, SaleQuote, SellOrder};

use super::{bounded, non_negative, to_native_precision};
use crate::position::CollateralAsset;
use crate::result::{AssetSale, StageItem, StageKind, StageResult};

const KIND: StageKind = StageKind::MarketSale;

/// Proportional slice of every held, weighted asset.
///
/// Sized from held amounts, not from the remaining debt: this stage sells
/// what is left rather than chasing a dollar target.
pub fn sell_list(collateral: &[CollateralAsset]) -> SmallVec<[SellOrder; 8]> {
    collateral
        .iter()
        .filter(|a| a.is_weighted() && a.amount > Decimal::ZERO)
        .map(|a| SellOrder {
            denom: a.denom.clone(),
            amount: to_native_precision(a.amount * a.weight, a.decimals),
        })
        .filter(|order| order.amount > Decimal::ZERO)
        .collect()
}

/// Simulates selling collateral into the credit asset through swap routes.
#[derive(Debug, Clone)]
pub struct MarketSaleStage {
    router: Arc<dyn RouteSaleSimulation>,
    timeout: Duration,
}

impl MarketSaleStage {
    pub fn new(router: Arc<dyn RouteSaleSimulation>, timeout: Duration) -> Self {
        Self { router, timeout }
    }

    #[instrument(skip(self, collateral))]
    pub async fn run(
        &self,
        remaining: Decimal,
        collateral: &[CollateralAsset],
        credit_denom: &str,
    ) -> StageResult {
        if remaining.is_zero() {
            debug!("Nothing to cover, skipping market sale");
            return StageResult::skipped(KIND);
        }

        let sell = sell_list(collateral);
        if sell.is_empty() {
            debug!("No collateral left to sell");
            return StageResult::computed(KIND, remaining, Decimal::ZERO, Decimal::ZERO, Vec::new(), Vec::new());
        }

        match bounded(self.timeout, self.router.simulate_sale(&sell, credit_denom)).await {
            Ok(quote) => Self::fold_quote(remaining, &sell, quote),
            Err(error) => {
                warn!(error = %error, "Route simulation failed, market sale has no data");
                let items = sell
                    .iter()
                    .map(|order| {
                        StageItem::Sale(AssetSale {
                            denom: order.denom.clone(),
                            sell_amount: order.amount,
                            input_value: None,
                            output_value: None,
                            hops: Vec::new(),
                        })
                    })
                    .collect();
                StageResult::no_data(
                    KIND,
                    remaining,
                    error,
                    items,
                    Vec::new(),
                )
            }
        }
    }

    fn fold_quote(remaining: Decimal, sell: &[SellOrder], quote: SaleQuote) -> StageResult {
        let input = non_negative(quote.total_input_value, "sale input value");
        let output = non_negative(quote.total_output_value, "sale output value");
        let slippage = non_negative(input - output, "slippage cost");

        if quote.slippage_cost != slippage {
            debug!(
                reported = %quote.slippage_cost,
                derived = %slippage,
                "Router slippage differs from input minus output, using derived value"
            );
        }

        let routes = quote.routes.unwrap_or_default();
        let items = sell
            .iter()
            .map(|order| {
                let route = routes.iter().find(|r| r.denom == order.denom);
                StageItem::Sale(AssetSale {
                    denom: order.denom.clone(),
                    sell_amount: order.amount,
                    input_value: route.map(|r| r.input_value),
                    output_value: route.map(|r| r.output_value),
                    hops: route.map(|r| r.hops.to_vec()).unwrap_or_default(),
                })
            })
            .collect();

        debug!(
            input = %input,
            output = %output,
            slippage = %slippage,
            routes = routes.len(),
            direct = routes.iter().filter(|r| r.is_direct()).count(),
            "Market sale computed"
        );
        StageResult::computed(KIND, remaining, output, slippage, items, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use crate::result::StageOutcome;
    use crate::testing::{collateral, quote, MockReply, MockRouter};
    use rust_decimal_macros::dec;
    use waterfall_api::{AssetRoute, RouteHop};

    fn stage(mock: &Arc<MockRouter>) -> MarketSaleStage {
        MarketSaleStage::new(mock.clone(), Duration::from_millis(50))
    }

    #[test]
    fn test_sell_list_uses_held_amounts() {
        let mut assets = collateral();
        assets[1].amount = Decimal::ZERO;
        let sell = sell_list(&assets);

        assert_eq!(sell.len(), 2);
        assert_eq!(sell[0].denom, "uatom");
        assert_eq!(sell[0].amount, dec!(2.5));
        assert_eq!(sell[1].denom, "utia");
        assert_eq!(sell[1].amount, dec!(4));
    }

    #[tokio::test]
    async fn test_output_and_slippage() {
        let mock = Arc::new(MockRouter::new(MockReply::Ok(quote(dec!(15), dec!(13)))));
        let result = stage(&mock).run(dec!(15), &collateral(), "ucdt").await;

        assert_eq!(result.fulfilled(), Some(dec!(13)));
        assert_eq!(result.cost(), Some(dec!(2)));
        assert_eq!(result.remaining_after, dec!(2));
        assert_eq!(result.items.len(), 3);
        assert_eq!(mock.last_target().as_deref(), Some("ucdt"));
    }

    #[tokio::test]
    async fn test_sell_amount_independent_of_remaining() {
        let mock = Arc::new(MockRouter::new(MockReply::Ok(quote(dec!(15), dec!(13)))));
        stage(&mock).run(dec!(1), &collateral(), "ucdt").await;
        let small = mock.last_sell();
        stage(&mock).run(dec!(1000), &collateral(), "ucdt").await;

        assert_eq!(small, mock.last_sell());
    }

    #[tokio::test]
    async fn test_route_failure_is_no_data() {
        let mock = Arc::new(MockRouter::new(MockReply::Fail("no liquidity path".to_string())));
        let result = stage(&mock).run(dec!(15), &collateral(), "ucdt").await;

        assert!(result.is_no_data());
        assert_eq!(result.fulfilled(), None);
        assert_eq!(result.remaining_after, dec!(15));
        assert_ne!(result.outcome, StageOutcome::ComputedZero);
    }

    #[tokio::test]
    async fn test_route_timeout_is_no_data() {
        let mock = Arc::new(MockRouter::new(MockReply::Hang));
        let result = stage(&mock).run(dec!(15), &collateral(), "ucdt").await;

        assert!(result.is_no_data());
        match &result.outcome {
            StageOutcome::NoData { reason } => {
                assert!(reason.is_timeout());
                assert_eq!(*reason, SimulationError::Timeout(50));
            }
            other => panic!("expected no-data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_sell_list_is_computed_zero() {
        let mock = Arc::new(MockRouter::new(MockReply::Ok(quote(dec!(15), dec!(13)))));
        let mut assets = collateral();
        for asset in &mut assets {
            asset.amount = Decimal::ZERO;
        }
        let result = stage(&mock).run(dec!(15), &assets, "ucdt").await;

        assert_eq!(result.outcome, StageOutcome::ComputedZero);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_output_above_input_clamps_slippage() {
        let mock = Arc::new(MockRouter::new(MockReply::Ok(quote(dec!(10), dec!(11)))));
        let result = stage(&mock).run(dec!(15), &collateral(), "ucdt").await;

        assert_eq!(result.cost(), Some(Decimal::ZERO));
        assert_eq!(result.fulfilled(), Some(dec!(11)));
    }

    #[tokio::test]
    async fn test_per_asset_routes_attached() {
        let mut sale = quote(dec!(15), dec!(13));
        sale.routes = Some(vec![AssetRoute {
            denom: "utia".to_string(),
            amount_in: dec!(4),
            input_value: dec!(40),
            output_value: dec!(38),
            hops: smallvec::smallvec![RouteHop {
                venue: "pool-9".to_string(),
                token_in: "utia".to_string(),
                token_out: "ucdt".to_string(),
                amount_in: dec!(4),
                amount_out: dec!(38),
            }],
        }]);
        let mock = Arc::new(MockRouter::new(MockReply::Ok(sale)));
        let result = stage(&mock).run(dec!(15), &collateral(), "ucdt").await;

        match &result.items[2] {
            StageItem::Sale(sale) => {
                assert_eq!(sale.output_value, Some(dec!(38)));
                assert_eq!(sale.hops.len(), 1);
            }
            other => panic!("unexpected item {:?}", other),
        }
        match &result.items[0] {
            StageItem::Sale(sale) => assert!(sale.input_value.is_none()),
            other => panic!("unexpected item {:?}", other),
        }
    }
}
