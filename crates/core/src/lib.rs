//! Liquidation waterfall simulator.
//!
//! Estimates how an undercollateralized position would be unwound:
//! - Liquidation threshold and amount from collateral value and LTVs
//! - Capital recall from deposit venues
//! - Liquidation queue fills per weighted collateral asset
//! - Routed market sale of the remaining collateral
//!
//! Each stage reports *computed*, *computed-zero* or *no-data*; a stage with
//! no data passes the debt it received to the next stage unchanged. All
//! arithmetic is [`rust_decimal::Decimal`]; rounding happens only in
//! [`Report`].

pub mod config;
mod error;
mod orchestrator;
mod position;
mod report;
mod result;
mod runner;
mod snapshot;
mod stages;
mod threshold;

#[cfg(test)]
mod testing;

pub use config::{CacheConfig, QueryConfig, SimulatorConfig, WeightConfig};
pub use error::SimulationError;
pub use orchestrator::Simulator;
pub use position::{CollateralAsset, CreditAsset, Position, SimulationInput, Venue};
pub use report::{display_round, Report, StageRow};
pub use result::{
    AssetSale, ItemFailure, QueueMatch, SimulationResult, StageItem, StageKind, StageOutcome,
    StageResult, VenueRecall,
};
pub use runner::{RunOutput, SimulationRunner};
pub use snapshot::SnapshotLoader;
pub use stages::{debt_shares, sell_list, CapitalRecallStage, LiquidationQueueStage, MarketSaleStage};
pub use threshold::{liquidation_threshold, LiquidationThreshold};
