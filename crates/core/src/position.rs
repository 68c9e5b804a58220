//! Position snapshot consumed by a simulation run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use waterfall_api::VenueHolding;

/// Collateral asset with its oracle price at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralAsset {
    pub denom: String,
    /// Held amount in display units
    pub amount: Decimal,
    /// Oracle price (USD)
    pub price: Decimal,
    /// Native unit precision
    pub decimals: u32,
    /// Share of the position's collateral value (0..=1)
    pub weight: Decimal,
}

impl CollateralAsset {
    /// USD value of the held amount.
    #[inline]
    pub fn value(&self) -> Decimal {
        self.amount * self.price
    }

    /// Whether this asset takes part in queue matching and market sale.
    #[inline]
    pub fn is_weighted(&self) -> bool {
        self.weight > Decimal::ZERO
    }
}

/// The asset the position's debt is denominated in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditAsset {
    pub denom: String,
    /// Reference price; `None` if neither the basket nor the oracle knows it
    pub price: Option<Decimal>,
}

/// Capital deployment venue holding funds on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub address: String,
    /// Debt currently held by the venue for the user
    pub deployed: Decimal,
}

impl From<VenueHolding> for Venue {
    fn from(holding: VenueHolding) -> Self {
        Self {
            address: holding.address,
            deployed: holding.deployed,
        }
    }
}

/// Collateralized debt position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub collateral: Vec<CollateralAsset>,
    pub credit: CreditAsset,
    /// Outstanding debt in credit units
    pub debt_amount: Decimal,
    /// Liquidation LTV (percent)
    pub liquidation_ltv: Decimal,
    /// Borrow LTV (percent)
    pub borrow_ltv: Decimal,
    #[serde(default)]
    pub venues: Vec<Venue>,
}

impl Position {
    /// Total USD value of all held collateral.
    pub fn collateral_value(&self) -> Decimal {
        self.collateral.iter().map(CollateralAsset::value).sum()
    }

    /// Assets with a positive weight, in position order.
    pub fn weighted_assets(&self) -> impl Iterator<Item = &CollateralAsset> {
        self.collateral.iter().filter(|a| a.is_weighted())
    }

    /// Sum of the positive weights.
    pub fn weight_sum(&self) -> Decimal {
        self.weighted_assets().map(|a| a.weight).sum()
    }

    /// Current LTV in percent, or `None` without collateral value.
    pub fn current_ltv(&self) -> Option<Decimal> {
        let value = self.collateral_value();
        if value.is_zero() {
            return None;
        }
        let credit_price = self.credit.price.unwrap_or(Decimal::ONE);
        (self.debt_amount * credit_price * Decimal::ONE_HUNDRED).checked_div(value)
    }

    /// Clamp weights into `[0, 1]` and rescale them to sum to one when they
    /// drift further than `tolerance`.
    ///
    /// Returns `false` if no asset has a positive weight afterwards.
    pub fn normalize_weights(&mut self, tolerance: Decimal) -> bool {
        for asset in &mut self.collateral {
            if asset.weight < Decimal::ZERO || asset.weight > Decimal::ONE {
                let clamped = asset.weight.clamp(Decimal::ZERO, Decimal::ONE);
                warn!(
                    denom = %asset.denom,
                    weight = %asset.weight,
                    clamped = %clamped,
                    "Invariant violation: weight out of range, clamped"
                );
                asset.weight = clamped;
            }
        }

        let sum = self.weight_sum();
        if sum.is_zero() {
            return false;
        }

        if (sum - Decimal::ONE).abs() > tolerance {
            warn!(sum = %sum, "Invariant violation: weights do not sum to one, rescaling");
            for asset in self.collateral.iter_mut().filter(|a| a.weight > Decimal::ZERO) {
                asset.weight /= sum;
            }
        }
        true
    }
}

/// Everything a run needs, fetched once and never re-read mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationInput {
    /// User whose position is being previewed
    pub user: String,
    pub position: Position,
}

impl SimulationInput {
    pub fn new(user: impl Into<String>, position: Position) -> Self {
        Self {
            user: user.into(),
            position,
        }
    }
}
