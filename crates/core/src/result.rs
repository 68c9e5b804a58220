//! Stage and simulation results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use waterfall_api::RouteHop;

use crate::error::SimulationError;

/// The three remediation stages, in waterfall order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Withdraw the user's own capital from deployment venues
    CapitalRecall,
    /// Match collateral against standing liquidation bids
    LiquidationQueue,
    /// Sell what collateral is left through swap routes
    MarketSale,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [Self::CapitalRecall, Self::LiquidationQueue, Self::MarketSale];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CapitalRecall => "capital recall",
            Self::LiquidationQueue => "liquidation queue",
            Self::MarketSale => "market sale",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tri-state stage outcome. *No-data* never carries numbers so it cannot be
/// mistaken for a computed zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Computed { fulfilled: Decimal, cost: Decimal },
    ComputedZero,
    NoData { reason: SimulationError },
}

impl StageOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Computed { .. } => "computed",
            Self::ComputedZero => "computed-zero",
            Self::NoData { .. } => "no-data",
        }
    }
}

/// One venue's contribution to capital recall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueRecall {
    pub venue: String,
    pub amount: Decimal,
}

/// One asset's liquidation queue match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMatch {
    pub denom: String,
    pub weight: Decimal,
    /// Slice of remaining debt assigned to this asset
    pub debt_share: Decimal,
    /// Collateral routed to the queue for that slice
    pub collateral_amount: Decimal,
    pub debt_repaid: Decimal,
    pub leftover_collateral: Decimal,
    /// Value of the leftover collateral
    pub cost: Decimal,
}

/// One asset's market sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSale {
    pub denom: String,
    pub sell_amount: Decimal,
    /// Per-asset values, when the router reports them
    pub input_value: Option<Decimal>,
    pub output_value: Option<Decimal>,
    #[serde(default)]
    pub hops: Vec<RouteHop>,
}

/// Ordered per-item breakdown entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageItem {
    Venue(VenueRecall),
    Queue(QueueMatch),
    Sale(AssetSale),
}

/// A sub-query that was excluded from a stage aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Venue address or asset denom
    pub key: String,
    pub error: SimulationError,
}

/// Result of one remediation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub kind: StageKind,
    pub outcome: StageOutcome,
    /// Debt left to cover when the stage started
    pub remaining_before: Decimal,
    /// Debt handed to the next stage
    pub remaining_after: Decimal,
    pub items: Vec<StageItem>,
    pub failures: Vec<ItemFailure>,
}

impl StageResult {
    /// Build a computed result. Outcome is *computed-zero* when both figures
    /// are zero.
    pub(crate) fn computed(
        kind: StageKind,
        remaining_before: Decimal,
        fulfilled: Decimal,
        cost: Decimal,
        items: Vec<StageItem>,
        failures: Vec<ItemFailure>,
    ) -> Self {
        let outcome = if fulfilled.is_zero() && cost.is_zero() {
            StageOutcome::ComputedZero
        } else {
            StageOutcome::Computed { fulfilled, cost }
        };

        Self {
            kind,
            outcome,
            remaining_before,
            remaining_after: (remaining_before - fulfilled).max(Decimal::ZERO),
            items,
            failures,
        }
    }

    /// Stage skipped because no debt was left to cover.
    pub(crate) fn skipped(kind: StageKind) -> Self {
        Self::computed(kind, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Vec::new(), Vec::new())
    }

    /// Stage that could not be computed. Remaining debt passes through.
    pub(crate) fn no_data(
        kind: StageKind,
        remaining_before: Decimal,
        reason: SimulationError,
        items: Vec<StageItem>,
        failures: Vec<ItemFailure>,
    ) -> Self {
        Self {
            kind,
            outcome: StageOutcome::NoData { reason },
            remaining_before,
            remaining_after: remaining_before,
            items,
            failures,
        }
    }

    /// Debt-equivalent recovered, `None` for *no-data*.
    pub fn fulfilled(&self) -> Option<Decimal> {
        match &self.outcome {
            StageOutcome::Computed { fulfilled, .. } => Some(*fulfilled),
            StageOutcome::ComputedZero => Some(Decimal::ZERO),
            StageOutcome::NoData { .. } => None,
        }
    }

    /// Value lost to the process, `None` for *no-data*.
    pub fn cost(&self) -> Option<Decimal> {
        match &self.outcome {
            StageOutcome::Computed { cost, .. } => Some(*cost),
            StageOutcome::ComputedZero => Some(Decimal::ZERO),
            StageOutcome::NoData { .. } => None,
        }
    }

    /// Part of `fulfilled` that actually reduced remaining debt.
    pub fn applied(&self) -> Option<Decimal> {
        self.fulfilled().map(|f| f.min(self.remaining_before))
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.outcome, StageOutcome::NoData { .. })
    }

    pub fn has_partial_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Full waterfall breakdown for one position snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Collateral value the thresholds were computed from
    pub collateral_value: Decimal,
    /// LTV of the position at snapshot time (percent)
    pub current_ltv: Option<Decimal>,
    /// Debt level at which liquidation triggers
    pub threshold: Decimal,
    /// Debt-equivalent that must be recovered
    pub liquidated_amount: Decimal,
    /// Capital recall, liquidation queue, market sale
    pub stages: [StageResult; 3],
    /// Debt no stage covered; positive means a potential shortfall
    pub final_remainder: Decimal,
}

impl SimulationResult {
    pub fn stage(&self, kind: StageKind) -> &StageResult {
        match kind {
            StageKind::CapitalRecall => &self.stages[0],
            StageKind::LiquidationQueue => &self.stages[1],
            StageKind::MarketSale => &self.stages[2],
        }
    }

    /// Whether some debt would remain uncovered.
    pub fn has_shortfall(&self) -> bool {
        self.final_remainder > Decimal::ZERO
    }

    /// Whether every stage produced numbers.
    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|s| !s.is_no_data())
    }

    /// Sum of stage costs that could be computed.
    pub fn total_cost(&self) -> Decimal {
        self.stages.iter().filter_map(StageResult::cost).sum()
    }

    /// Remaining debt before the first stage and after each stage.
    pub fn remaining_trace(&self) -> [Decimal; 4] {
        [
            self.liquidated_amount,
            self.stages[0].remaining_after,
            self.stages[1].remaining_after,
            self.stages[2].remaining_after,
        ]
    }
}
