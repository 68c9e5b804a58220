//! Builds the immutable [`SimulationInput`] for a run.
//!
//! Position and prices are read exactly once here and then passed to every
//! stage, so all stages see the same snapshot.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use waterfall_api::{PositionRead, PriceLookup};

use crate::config::SimulatorConfig;
use crate::error::SimulationError;
use crate::position::{CollateralAsset, CreditAsset, Position, SimulationInput, Venue};
use crate::stages::{bounded, non_negative};

/// Reads a position and prices it.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    positions: Arc<dyn PositionRead>,
    prices: Arc<dyn PriceLookup>,
    position_timeout: Duration,
    price_timeout: Duration,
    weight_tolerance: Decimal,
}

impl SnapshotLoader {
    pub fn new(
        positions: Arc<dyn PositionRead>,
        prices: Arc<dyn PriceLookup>,
        config: &SimulatorConfig,
    ) -> Self {
        Self {
            positions,
            prices,
            position_timeout: config.queries.position_timeout(),
            price_timeout: config.queries.price_timeout(),
            weight_tolerance: config.weights.tolerance,
        }
    }

    /// Load and validate the snapshot for `user`.
    ///
    /// Fails with [`SimulationError::MissingInput`] when the position cannot
    /// be read or a held collateral asset has no price. A missing credit price
    /// is not fatal here; the liquidation queue stage reports it.
    #[instrument(skip(self))]
    pub async fn load(&self, user: &str) -> Result<SimulationInput, SimulationError> {
        let view = bounded(self.position_timeout, self.positions.read_position(user))
            .await
            .map_err(|e| SimulationError::MissingInput(format!("position for {}: {}", user, e)))?;

        let lookups = view
            .collateral
            .iter()
            .map(|holding| bounded(self.price_timeout, self.prices.price(&holding.denom)));
        let prices = join_all(lookups).await;

        let mut collateral = Vec::with_capacity(view.collateral.len());
        for (holding, price) in view.collateral.into_iter().zip(prices) {
            let amount = non_negative(holding.amount, "held collateral amount");
            let price = match price {
                Ok(Some(price)) if price > Decimal::ZERO => price,
                Ok(_) | Err(_) if amount.is_zero() => {
                    debug!(denom = %holding.denom, "Unpriced empty collateral, dropping it");
                    continue;
                }
                Ok(_) => {
                    return Err(SimulationError::MissingInput(format!(
                        "price for {}",
                        holding.denom
                    )))
                }
                Err(e) => {
                    return Err(SimulationError::MissingInput(format!(
                        "price for {}: {}",
                        holding.denom, e
                    )))
                }
            };

            collateral.push(CollateralAsset {
                denom: holding.denom,
                amount,
                price,
                decimals: holding.decimals,
                weight: holding.weight,
            });
        }

        let credit_price = match view.credit_price {
            Some(price) => Some(price),
            None => match bounded(self.price_timeout, self.prices.price(&view.credit_denom)).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(credit = %view.credit_denom, error = %e, "Credit price lookup failed");
                    None
                }
            },
        };

        let mut position = Position {
            collateral,
            credit: CreditAsset {
                denom: view.credit_denom,
                price: credit_price,
            },
            debt_amount: non_negative(view.debt_amount, "debt amount"),
            liquidation_ltv: view.liquidation_ltv,
            borrow_ltv: view.borrow_ltv,
            venues: view.venues.into_iter().map(Venue::from).collect(),
        };

        if !position.normalize_weights(self.weight_tolerance) {
            warn!(user, "Position has no weighted collateral");
        }

        debug!(
            assets = position.collateral.len(),
            venues = position.venues.len(),
            collateral_value = %position.collateral_value(),
            "Snapshot loaded"
        );

        Ok(SimulationInput::new(user, position))
    }
}
