//! Read capabilities consumed by the waterfall simulator.
//!
//! Each trait is one external data source. Implementations are expected to be
//! read-only; the simulator never mutates chain state through them.
//!
//! # Example
//!
//! ```rust,ignore
//! use waterfall_api::{ContractQueryClient, LiquidationQueueQuery, QueueRequest};
//!
//! let client = ContractQueryClient::new("https://lcd.osmosis.zone")
//!     .with_liquidation_queue("osmo1...queue");
//! let fill = client.check_liquidatable(&request).await?;
//! ```

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::Debug;

/// Oracle price feed.
#[async_trait]
pub trait PriceLookup: Send + Sync + Debug {
    /// Price of `denom` in USD, or `None` if the oracle does not know it.
    async fn price(&self, denom: &str) -> Result<Option<Decimal>>;
}

/// Position and basket state reader.
#[async_trait]
pub trait PositionRead: Send + Sync + Debug {
    async fn read_position(&self, user: &str) -> Result<PositionView>;
}

/// Deployment venue balance query.
#[async_trait]
pub trait VenueRetrievalQuery: Send + Sync + Debug {
    /// Amount the user could withdraw from `venue` right now, in debt units.
    async fn retrievable(&self, venue: &str, user: &str) -> Result<Decimal>;
}

/// Liquidation queue matching simulation, one call per collateral asset.
#[async_trait]
pub trait LiquidationQueueQuery: Send + Sync + Debug {
    async fn check_liquidatable(&self, request: &QueueRequest) -> Result<QueueFill>;
}

/// Market sale simulation through swap routes.
#[async_trait]
pub trait RouteSaleSimulation: Send + Sync + Debug {
    /// Simulate selling every order in `sell` into `target`.
    ///
    /// An `Err` means no route could be simulated. Callers must not treat it
    /// as a zero-output sale.
    async fn simulate_sale(&self, sell: &[SellOrder], target: &str) -> Result<SaleQuote>;
}

/// Position state as read from the basket/position contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    /// Collateral holdings with their basket weights
    pub collateral: Vec<CollateralHolding>,
    /// Credit (debt) asset denom
    pub credit_denom: String,
    /// Credit asset reference price, if the basket exposes one
    #[serde(default)]
    pub credit_price: Option<Decimal>,
    /// Outstanding debt in credit units
    pub debt_amount: Decimal,
    /// LTV at which the position becomes liquidatable (percent)
    pub liquidation_ltv: Decimal,
    /// LTV the position is restored to after liquidation (percent)
    pub borrow_ltv: Decimal,
    /// Capital deployment venues holding funds for the user
    #[serde(default)]
    pub venues: Vec<VenueHolding>,
}

/// One collateral asset in a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralHolding {
    pub denom: String,
    /// Held amount in display units
    pub amount: Decimal,
    /// Native unit precision
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    /// Share of the position's collateral value (0..=1)
    pub weight: Decimal,
}

fn default_decimals() -> u32 {
    6
}

/// A capital deployment venue tied to a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueHolding {
    /// Venue contract address
    pub address: String,
    /// Debt currently held by the venue on the user's behalf
    pub deployed: Decimal,
}

/// Arguments of a liquidation queue check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueRequest {
    pub asset_denom: String,
    /// Collateral routed to the queue, in display units
    pub collateral_amount: Decimal,
    pub asset_price: Decimal,
    pub credit_denom: String,
    pub credit_price: Decimal,
}

/// Liquidation queue response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFill {
    /// Debt repaid by matched bids
    pub debt_repaid: Decimal,
    /// Collateral not matched to any bid, in display units
    pub leftover_collateral: Decimal,
}

/// One entry of a sell list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellOrder {
    pub denom: String,
    pub amount: Decimal,
}

/// Route sale simulation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleQuote {
    /// USD value of everything sold
    pub total_input_value: Decimal,
    /// Value received in the target asset
    pub total_output_value: Decimal,
    /// Slippage as reported by the router
    pub slippage_cost: Decimal,
    /// Per-asset routes, when the router exposes them
    #[serde(default)]
    pub routes: Option<Vec<AssetRoute>>,
}

/// Route taken by one sold asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRoute {
    pub denom: String,
    pub amount_in: Decimal,
    pub input_value: Decimal,
    pub output_value: Decimal,
    pub hops: SmallVec<[RouteHop; 4]>,
}

impl AssetRoute {
    /// Check if this is a direct swap (single hop).
    pub fn is_direct(&self) -> bool {
        self.hops.len() == 1
    }
}

/// A single swap hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteHop {
    /// DEX or pool identifier
    pub venue: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_view_defaults() {
        let json = r#"{
            "collateral": [{"denom": "uosmo", "amount": "10", "weight": "1"}],
            "credit_denom": "ucdt",
            "debt_amount": "5",
            "liquidation_ltv": "80",
            "borrow_ltv": "70"
        }"#;

        let view: PositionView = serde_json::from_str(json).unwrap();
        assert_eq!(view.collateral[0].decimals, 6);
        assert_eq!(view.collateral[0].amount, dec!(10));
        assert!(view.credit_price.is_none());
        assert!(view.venues.is_empty());
    }

    #[test]
    fn test_asset_route_direct() {
        let route = AssetRoute {
            denom: "uatom".to_string(),
            amount_in: dec!(1),
            input_value: dec!(10),
            output_value: dec!(9.9),
            hops: smallvec::smallvec![RouteHop {
                venue: "pool-1".to_string(),
                token_in: "uatom".to_string(),
                token_out: "ucdt".to_string(),
                amount_in: dec!(1),
                amount_out: dec!(9.9),
            }],
        };
        assert!(route.is_direct());
    }
}
