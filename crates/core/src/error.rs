//! Failure taxonomy for simulation runs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a query, a stage, or a whole run could not produce a number.
///
/// None of these abort a run on their own: per-item failures are folded into
/// the stage aggregate and stage failures become *no-data* stage outcomes.
/// Only a snapshot that cannot be built at all surfaces as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SimulationError {
    /// Required position, price or basket data is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// A capability query returned an error.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A capability query did not answer within its bound.
    #[error("query timed out after {0}ms")]
    Timeout(u64),

    /// A whole stage could not be simulated.
    #[error("stage could not be simulated: {0}")]
    StageFailed(String),
}

impl SimulationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
