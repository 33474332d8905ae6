//! View sync configuration module
//!
//! Handles loading and parsing of engine configuration from files and environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::region_scanner::MAX_SCAN_RADIUS;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/view_sync.toml";

/// View sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSyncConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Scheduler tick interval in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// Default horizontal scan radius around a portal
    #[serde(default = "default_radius_horizontal")]
    pub radius_horizontal: i32,

    /// Default vertical scan radius around a portal
    #[serde(default = "default_radius_vertical")]
    pub radius_vertical: i32,

    /// Moves at or beyond this distance on any axis are sent as teleports
    #[serde(default = "default_relative_move_threshold")]
    pub relative_move_threshold: f64,

    /// Ticks to hold back entity operations after a client loads a world
    #[serde(default = "default_load_grace_ticks")]
    pub load_grace_ticks: u32,

    /// Tick sessions on the rayon pool instead of one by one
    #[serde(default = "default_true")]
    pub parallel_sessions: bool,

    /// Capacity of each client's outbound operation queue
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

// Default value functions
fn default_tick_rate() -> u64 {
    50 // one server tick
}

fn default_radius_horizontal() -> i32 {
    10
}

fn default_radius_vertical() -> i32 {
    6
}

fn default_relative_move_threshold() -> f64 {
    8.0
}

fn default_load_grace_ticks() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_outbound_queue_capacity() -> usize {
    1024
}

impl Default for ViewSyncConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            tick_rate_ms: default_tick_rate(),
            radius_horizontal: default_radius_horizontal(),
            radius_vertical: default_radius_vertical(),
            relative_move_threshold: default_relative_move_threshold(),
            load_grace_ticks: default_load_grace_ticks(),
            parallel_sessions: default_true(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl ViewSyncConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("PORTAL_VIEW_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = Self::load_from(&config_path).await?;

        // Override with environment variables
        config.apply_env_overrides();

        config.validate()?;

        Ok(config)
    }

    /// Read a config file, falling back to defaults when it is missing
    pub async fn load_from(config_path: &std::path::Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path.to_path_buf();
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PORTAL_VIEW_TICK_RATE_MS") {
            if let Ok(rate) = val.parse() {
                self.tick_rate_ms = rate;
            }
        }
        if let Ok(val) = env::var("PORTAL_VIEW_RADIUS_HORIZONTAL") {
            if let Ok(radius) = val.parse() {
                self.radius_horizontal = radius;
            }
        }
        if let Ok(val) = env::var("PORTAL_VIEW_RADIUS_VERTICAL") {
            if let Ok(radius) = val.parse() {
                self.radius_vertical = radius;
            }
        }
        if let Ok(val) = env::var("PORTAL_VIEW_MOVE_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.relative_move_threshold = threshold;
            }
        }
        if let Ok(val) = env::var("PORTAL_VIEW_LOAD_GRACE_TICKS") {
            if let Ok(ticks) = val.parse() {
                self.load_grace_ticks = ticks;
            }
        }
        if let Ok(val) = env::var("PORTAL_VIEW_PARALLEL") {
            self.parallel_sessions = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("PORTAL_VIEW_QUEUE_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.outbound_queue_capacity = capacity;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_ms < 10 || self.tick_rate_ms > 5000 {
            anyhow::bail!("Tick rate must be between 10ms and 5000ms");
        }

        if !(0..=MAX_SCAN_RADIUS).contains(&self.radius_horizontal)
            || !(0..=MAX_SCAN_RADIUS).contains(&self.radius_vertical)
        {
            anyhow::bail!("Scan radii must be between 0 and {}", MAX_SCAN_RADIUS);
        }

        if self.relative_move_threshold.is_nan() || self.relative_move_threshold <= 0.0 {
            anyhow::bail!("Relative move threshold must be positive");
        }

        if self.load_grace_ticks > 20 {
            anyhow::bail!("Load grace must be at most 20 ticks");
        }

        if self.outbound_queue_capacity == 0 {
            anyhow::bail!("Outbound queue capacity must be at least 1");
        }

        Ok(())
    }

    /// Tick interval as a duration
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_rate_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ViewSyncConfig::default();
        assert_eq!(config.tick_rate_ms, 50);
        assert_eq!(config.radius_horizontal, 10);
        assert_eq!(config.radius_vertical, 6);
        assert_eq!(config.relative_move_threshold, 8.0);
        assert_eq!(config.load_grace_ticks, 1);
        assert!(config.parallel_sessions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ViewSyncConfig::from_toml("tick_rate_ms = 100\nload_grace_ticks = 3\n").unwrap();
        assert_eq!(config.tick_rate_ms, 100);
        assert_eq!(config.load_grace_ticks, 3);
        assert_eq!(config.radius_horizontal, 10);
        assert_eq!(config.outbound_queue_capacity, 1024);
    }

    #[test]
    fn test_validation() {
        let mut config = ViewSyncConfig::default();

        config.tick_rate_ms = 5;
        assert!(config.validate().is_err());
        config.tick_rate_ms = 50;

        config.radius_horizontal = MAX_SCAN_RADIUS + 1;
        assert!(config.validate().is_err());
        config.radius_horizontal = 10;

        config.relative_move_threshold = 0.0;
        assert!(config.validate().is_err());
        config.relative_move_threshold = f64::NAN;
        assert!(config.validate().is_err());
        config.relative_move_threshold = 8.0;

        config.load_grace_ticks = 21;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::path::Path::new("does/not/exist/view_sync.toml");
        let config = tokio_test::block_on(ViewSyncConfig::load_from(path)).unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.tick_rate_ms, 50);
    }
}
