//! The three remediation stages of the waterfall.
//!
//! Each stage takes the debt still uncovered, fans its sub-queries out
//! concurrently, and folds per-item outcomes into a [`StageResult`]. A failed
//! sub-query is excluded from the aggregate, never propagated.
//!
//! [`StageResult`]: crate::StageResult

mod capital_recall;
mod liquidation_queue;
mod market_sale;

pub use capital_recall::CapitalRecallStage;
pub use liquidation_queue::{debt_shares, LiquidationQueueStage};
pub use market_sale::{sell_list, MarketSaleStage};

use rust_decimal::{Decimal, RoundingStrategy};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::SimulationError;

/// Clamp a negative figure to zero, logging the invariant violation.
pub(crate) fn non_negative(value: Decimal, what: &'static str) -> Decimal {
    if value < Decimal::ZERO {
        warn!(value = %value, what, "Invariant violation: negative value clamped to zero");
        Decimal::ZERO
    } else {
        value
    }
}

/// Truncate an amount toward zero at the asset's native precision.
#[inline]
pub(crate) fn to_native_precision(amount: Decimal, decimals: u32) -> Decimal {
    amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Run a capability query under a timeout, mapping both failure modes to
/// [`SimulationError`].
pub(crate) async fn bounded<T, F>(timeout: Duration, query: F) -> Result<T, SimulationError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, query).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SimulationError::QueryFailed(format!("{:#}", e))),
        Err(_) => Err(SimulationError::Timeout(timeout.as_millis() as u64)),
    }
}
