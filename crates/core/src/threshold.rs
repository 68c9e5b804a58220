//! Liquidation threshold and liquidated amount from LTV parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stages::non_negative;

/// Threshold figures for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationThreshold {
    /// Debt level at which the position becomes liquidatable
    pub threshold: Decimal,
    /// Amount to recover to bring the position back to borrow LTV
    pub liquidated_amount: Decimal,
}

/// Compute the liquidation threshold and the liquidated amount.
///
/// LTVs are percentages. A borrow LTV above the liquidation LTV yields a zero
/// liquidated amount.
pub fn liquidation_threshold(
    collateral_value: Decimal,
    liquidation_ltv: Decimal,
    borrow_ltv: Decimal,
) -> LiquidationThreshold {
    let collateral_value = non_negative(collateral_value, "collateral value");
    let liquidation_ltv = non_negative(liquidation_ltv, "liquidation LTV");
    let borrow_ltv = non_negative(borrow_ltv, "borrow LTV");

    let threshold = collateral_value * liquidation_ltv / Decimal::ONE_HUNDRED;
    let liquidated_amount =
        (collateral_value * (liquidation_ltv - borrow_ltv) / Decimal::ONE_HUNDRED).max(Decimal::ZERO);

    LiquidationThreshold {
        threshold,
        liquidated_amount,
    }
}
