//! Position reader backed by a JSON snapshot file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::capability::{PositionRead, PositionView};

/// Reads positions from a JSON object mapping user address to [`PositionView`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotFileReader {
    positions: HashMap<String, PositionView>,
}

impl SnapshotFileReader {
    /// Load a snapshot file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read position snapshot {:?}", path))?;
        let reader = Self::from_json(&content)
            .with_context(|| format!("Failed to parse position snapshot {:?}", path))?;

        info!(path = ?path, positions = reader.positions.len(), "Position snapshot loaded");
        Ok(reader)
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let positions: HashMap<String, PositionView> = serde_json::from_str(json)?;
        Ok(Self { positions })
    }

    /// Add or replace one user's position.
    pub fn with_position(mut self, user: impl Into<String>, view: PositionView) -> Self {
        self.positions.insert(user.into(), view);
        self
    }
}

#[async_trait]
impl PositionRead for SnapshotFileReader {
    async fn read_position(&self, user: &str) -> Result<PositionView> {
        self.positions
            .get(user)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No position for {}", user))
    }
}
