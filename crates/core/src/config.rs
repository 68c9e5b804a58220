//! Simulator configuration with profile support.
//!
//! Profiles: `default`, `testing`, `production`. Select with the
//! `WATERFALL_PROFILE` environment variable or load a TOML file from
//! `WATERFALL_CONFIG`.

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// Per-capability query timeouts
    #[serde(default)]
    pub queries: QueryConfig,

    /// Weight validation
    #[serde(default)]
    pub weights: WeightConfig,

    /// Query cache layer
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Bounded timeouts for every external sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Position read timeout (milliseconds)
    #[serde(default = "default_position_timeout")]
    pub position_timeout_ms: u64,

    /// Oracle price lookup timeout (milliseconds)
    #[serde(default = "default_price_timeout")]
    pub price_timeout_ms: u64,

    /// Venue retrieval query timeout (milliseconds)
    #[serde(default = "default_venue_timeout")]
    pub venue_timeout_ms: u64,

    /// Liquidation queue query timeout (milliseconds)
    #[serde(default = "default_queue_timeout")]
    pub queue_timeout_ms: u64,

    /// Route sale simulation timeout (milliseconds)
    #[serde(default = "default_route_timeout")]
    pub route_timeout_ms: u64,
}

fn default_position_timeout() -> u64 {
    5_000
}
fn default_price_timeout() -> u64 {
    3_000
}
fn default_venue_timeout() -> u64 {
    3_000
}
fn default_queue_timeout() -> u64 {
    5_000
}
fn default_route_timeout() -> u64 {
    8_000
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            position_timeout_ms: default_position_timeout(),
            price_timeout_ms: default_price_timeout(),
            venue_timeout_ms: default_venue_timeout(),
            queue_timeout_ms: default_queue_timeout(),
            route_timeout_ms: default_route_timeout(),
        }
    }
}

impl QueryConfig {
    pub fn position_timeout(&self) -> Duration {
        Duration::from_millis(self.position_timeout_ms)
    }
    pub fn price_timeout(&self) -> Duration {
        Duration::from_millis(self.price_timeout_ms)
    }
    pub fn venue_timeout(&self) -> Duration {
        Duration::from_millis(self.venue_timeout_ms)
    }
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
    pub fn route_timeout(&self) -> Duration {
        Duration::from_millis(self.route_timeout_ms)
    }
}

/// Weight validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Allowed deviation of the weight sum from one before rescaling
    #[serde(default = "default_weight_tolerance")]
    pub tolerance: Decimal,
}

fn default_weight_tolerance() -> Decimal {
    Decimal::new(1, 4)
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            tolerance: default_weight_tolerance(),
        }
    }
}

/// Query cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether capabilities are wrapped in a TTL cache
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Cache TTL (milliseconds)
    #[serde(default = "default_cache_ttl")]
    pub ttl_ms: u64,
}

fn default_cache_enabled() -> bool {
    true
}
fn default_cache_ttl() -> u64 {
    5_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_ms: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            queries: QueryConfig::default(),
            weights: WeightConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    /// Testing profile: generous timeouts, no caching.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            queries: QueryConfig {
                position_timeout_ms: 30_000,
                price_timeout_ms: 30_000,
                venue_timeout_ms: 30_000,
                queue_timeout_ms: 30_000,
                route_timeout_ms: 30_000,
            },
            weights: WeightConfig {
                tolerance: Decimal::new(1, 2), // 1%
            },
            cache: CacheConfig {
                enabled: false,
                ttl_ms: 0,
            },
        }
    }

    /// Production profile: tight timeouts so a slow venue cannot stall a preview.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            queries: QueryConfig {
                position_timeout_ms: 3_000,
                price_timeout_ms: 2_000,
                venue_timeout_ms: 2_000,
                queue_timeout_ms: 3_000,
                route_timeout_ms: 5_000,
            },
            weights: WeightConfig::default(),
            cache: CacheConfig {
                enabled: true,
                ttl_ms: 3_000,
            },
        }
    }

    /// Get profile from environment variable WATERFALL_PROFILE, or default.
    pub fn from_env() -> Self {
        let profile = std::env::var("WATERFALL_PROFILE").unwrap_or_else(|_| "default".to_string());
        match profile.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "production" | "prod" => Self::production(),
            _ => Self::default(),
        }
    }

    /// Load from the file named by WATERFALL_CONFIG, falling back to [`Self::from_env`].
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("WATERFALL_CONFIG") {
            Ok(path) => Self::from_file(&path),
            Err(_) => Ok(Self::from_env()),
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Simulator configuration loaded");
        tracing::info!(
            position_ms = self.queries.position_timeout_ms,
            price_ms = self.queries.price_timeout_ms,
            venue_ms = self.queries.venue_timeout_ms,
            queue_ms = self.queries.queue_timeout_ms,
            route_ms = self.queries.route_timeout_ms,
            "Query timeouts"
        );
        tracing::info!(
            weight_tolerance = %self.weights.tolerance,
            cache_enabled = self.cache.enabled,
            cache_ttl_ms = self.cache.ttl_ms,
            "Weights and cache"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = SimulatorConfig::default();
        assert_eq!(config.queries.venue_timeout(), Duration::from_secs(3));
        assert_eq!(config.weights.tolerance, dec!(0.0001));
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_testing_profile() {
        let config = SimulatorConfig::testing();
        assert_eq!(config.profile, "testing");
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_production_profile() {
        let config = SimulatorConfig::production();
        assert_eq!(config.profile, "production");
        assert!(config.queries.route_timeout_ms <= 5_000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SimulatorConfig = toml::from_str(
            r#"
            profile = "custom"

            [queries]
            queue_timeout_ms = 1234
            "#,
        )
        .unwrap();

        assert_eq!(config.profile, "custom");
        assert_eq!(config.queries.queue_timeout_ms, 1234);
        assert_eq!(config.queries.route_timeout_ms, 8_000);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_serialization() {
        let config = SimulatorConfig::production();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("profile = \"production\""));

        let parsed: SimulatorConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
