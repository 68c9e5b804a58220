//! External data capabilities for the liquidation waterfall simulator.
//!
//! This crate provides:
//! - Capability traits: price lookup, position read, venue retrieval,
//!   liquidation queue check, route sale simulation
//! - CosmWasm LCD smart-query client (oracle, venues, liquidation queue)
//! - Route simulation API client for market sale previews
//! - JSON snapshot position reader
//! - Explicit TTL cache wrapping any capability

mod cache;
mod capability;
mod contract;
mod router;
mod snapshot_file;

pub use cache::QueryCache;
pub use capability::{
    AssetRoute, CollateralHolding, LiquidationQueueQuery, PositionRead, PositionView, PriceLookup,
    QueueFill, QueueRequest, RouteHop, RouteSaleSimulation, SaleQuote, SellOrder, VenueHolding,
    VenueRetrievalQuery,
};
pub use contract::ContractQueryClient;
pub use router::RouteSimulatorClient;
pub use snapshot_file::SnapshotFileReader;
