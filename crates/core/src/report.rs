//! Presentation-boundary view of a [`SimulationResult`].
//!
//! This is the only place figures are rounded; the computation itself keeps
//! full precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

use crate::result::{SimulationResult, StageItem};

/// Round a figure for display.
#[inline]
pub fn display_round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One row of the waterfall table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRow {
    pub stage: &'static str,
    pub status: &'static str,
    pub fulfilled: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub remaining_after: Decimal,
    /// Whether some items were excluded after a failed query
    pub partial: bool,
    pub failed_items: usize,
    /// Per-item lines (venue or asset)
    pub details: Vec<String>,
}

/// Rounded waterfall summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub collateral_value: Decimal,
    pub current_ltv: Option<Decimal>,
    pub threshold: Decimal,
    pub liquidated_amount: Decimal,
    pub rows: Vec<StageRow>,
    pub final_remainder: Decimal,
    pub total_cost: Decimal,
    pub shortfall: bool,
    pub complete: bool,
}

impl Report {
    pub fn from_result(result: &SimulationResult) -> Self {
        let rows = result
            .stages
            .iter()
            .map(|stage| StageRow {
                stage: stage.kind.name(),
                status: stage.outcome.label(),
                fulfilled: stage.fulfilled().map(display_round),
                cost: stage.cost().map(display_round),
                remaining_after: display_round(stage.remaining_after),
                partial: stage.has_partial_failures(),
                failed_items: stage.failures.len(),
                details: stage.items.iter().map(item_line).collect(),
            })
            .collect();

        Self {
            collateral_value: display_round(result.collateral_value),
            current_ltv: result.current_ltv.map(display_round),
            threshold: display_round(result.threshold),
            liquidated_amount: display_round(result.liquidated_amount),
            rows,
            final_remainder: display_round(result.final_remainder),
            total_cost: display_round(result.total_cost()),
            shortfall: result.has_shortfall(),
            complete: result.is_complete(),
        }
    }
}

fn item_line(item: &StageItem) -> String {
    match item {
        StageItem::Venue(v) => format!("{}: {}", v.venue, display_round(v.amount)),
        StageItem::Queue(q) => format!(
            "{}: share {} repaid {} leftover {}",
            q.denom,
            display_round(q.debt_share),
            display_round(q.debt_repaid),
            q.leftover_collateral
        ),
        StageItem::Sale(s) => match s.output_value {
            Some(output) => format!(
                "{}: sell {} -> {} ({} hops)",
                s.denom,
                s.sell_amount,
                display_round(output),
                s.hops.len()
            ),
            None => format!("{}: sell {}", s.denom, s.sell_amount),
        },
    }
}

fn cell(value: Option<Decimal>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collateral value:   {}", self.collateral_value)?;
        writeln!(f, "Current LTV (%):    {}", cell(self.current_ltv))?;
        writeln!(f, "Liquidation at:     {}", self.threshold)?;
        writeln!(f, "Liquidated amount:  {}", self.liquidated_amount)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<18} {:<14} {:>14} {:>12} {:>14}",
            "stage", "status", "fulfilled", "cost", "remaining"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<18} {:<14} {:>14} {:>12} {:>14}",
                row.stage,
                row.status,
                cell(row.fulfilled),
                cell(row.cost),
                row.remaining_after
            )?;
            for detail in &row.details {
                writeln!(f, "    {}", detail)?;
            }
            if row.partial {
                writeln!(f, "    ({} item(s) unavailable)", row.failed_items)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "Total cost:         {}", self.total_cost)?;
        write!(f, "Uncovered debt:     {}", self.final_remainder)?;
        if self.shortfall {
            write!(f, "  SHORTFALL")?;
        }
        if !self.complete {
            write!(f, "  (incomplete: some stages have no data)")?;
        }
        writeln!(f)
    }
}
