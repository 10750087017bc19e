//! FarmBot configuration types and loading
//!
//! The configuration is built once at startup (file chain plus CLI
//! overrides, then [`Config::normalized`]) and handed to the session and
//! loops as an immutable value. Nothing mutates it after the loops start.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::SessionConfig;

/// Main FarmBot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend endpoint
    pub server: ServerConfig,

    /// Loop cadences
    pub intervals: IntervalsConfig,

    /// Session tuning
    pub session: SessionTuning,

    /// Inter-command pacing
    pub pacing: PacingConfig,

    /// Own-farm planting parameters
    pub farm: FarmConfig,

    /// Friend-patrol limits
    pub patrol: PatrolConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .farmbot.yml
        let local_config = PathBuf::from(".farmbot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/farmbot/farmbot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("farmbot").join("farmbot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply the interval floors and capacity minimums
    ///
    /// Non-zero intervals are clamped to at least one second; zero keeps its
    /// "loop disabled" meaning and is left alone.
    pub fn normalized(mut self) -> Self {
        self.intervals.farm_secs = floor_nonzero(self.intervals.farm_secs);
        self.intervals.friend_secs = floor_nonzero(self.intervals.friend_secs);
        self.intervals.task_secs = floor_nonzero(self.intervals.task_secs).max(1);
        self.intervals.warehouse_secs = floor_nonzero(self.intervals.warehouse_secs).max(1);
        self.session.heartbeat_interval_secs = self.session.heartbeat_interval_secs.max(1);
        self.session.request_timeout_ms = self.session.request_timeout_ms.max(100);
        self.session.pending_capacity = self.session.pending_capacity.max(1);
        self
    }

    /// Session parameters derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            request_timeout: Duration::from_millis(self.session.request_timeout_ms),
            heartbeat_interval: Duration::from_secs(self.session.heartbeat_interval_secs),
            pending_capacity: self.session.pending_capacity,
            ..SessionConfig::default()
        }
    }
}

fn floor_nonzero(secs: u64) -> u64 {
    if secs == 0 { 0 } else { secs.max(1) }
}

/// Backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Gateway hostname
    pub host: String,

    /// Gateway port
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` form for the connector
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "farm-gate.example.net".to_string(),
            port: 4430,
        }
    }
}

/// Loop cadences, in seconds
///
/// A zero farm or friend interval disables the corresponding loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    /// Own-farm re-scan delay
    #[serde(rename = "farm-secs")]
    pub farm_secs: u64,

    /// Friend-patrol delay
    #[serde(rename = "friend-secs")]
    pub friend_secs: u64,

    /// Task-claim delay
    #[serde(rename = "task-secs")]
    pub task_secs: u64,

    /// Warehouse sell cadence
    #[serde(rename = "warehouse-secs")]
    pub warehouse_secs: u64,

    /// Delay before the one early warehouse run after startup
    #[serde(rename = "warehouse-initial-delay-secs")]
    pub warehouse_initial_delay_secs: u64,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            farm_secs: 300,
            friend_secs: 600,
            task_secs: 900,
            warehouse_secs: 1800,
            warehouse_initial_delay_secs: 30,
        }
    }
}

/// Session tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Per-request deadline in milliseconds
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Keepalive cadence in seconds
    #[serde(rename = "heartbeat-interval-secs")]
    pub heartbeat_interval_secs: u64,

    /// Maximum in-flight requests
    #[serde(rename = "pending-capacity")]
    pub pending_capacity: usize,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            heartbeat_interval_secs: 30,
            pending_capacity: 64,
        }
    }
}

/// Delay between consecutive commands within a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Fixed part of the delay
    #[serde(rename = "base-ms")]
    pub base_ms: u64,

    /// Random extra on top, uniform in `0..=jitter-ms`
    #[serde(rename = "jitter-ms")]
    pub jitter_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_ms: 400,
            jitter_ms: 350,
        }
    }
}

/// Own-farm planting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Crop to plant on empty plots
    pub crop: u32,

    /// Inventory item id of that crop's seed
    #[serde(rename = "seed-item")]
    pub seed_item: u32,

    /// Seeds bought per restock purchase
    #[serde(rename = "seed-batch")]
    pub seed_batch: u32,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            crop: 101,
            seed_item: 1101,
            seed_batch: 5,
        }
    }
}

/// Friend-patrol limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    /// Commands allowed against a single friend per visit
    #[serde(rename = "action-budget")]
    pub action_budget: u32,

    /// Mature plots stolen from per visit
    #[serde(rename = "steal-limit")]
    pub steal_limit: u32,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            action_budget: 12,
            steal_limit: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default().normalized();
        assert!(config.intervals.farm_secs >= 1);
        assert!(config.session.pending_capacity >= 1);
        assert_eq!(config.server.addr(), "farm-gate.example.net:4430");
    }

    #[test]
    fn test_normalize_floors_nonzero_intervals() {
        let mut config = Config::default();
        config.intervals.farm_secs = 0;
        config.intervals.friend_secs = 0;
        config.session.heartbeat_interval_secs = 0;
        config.session.pending_capacity = 0;

        let config = config.normalized();
        // Zero means "disabled" and survives normalization
        assert_eq!(config.intervals.farm_secs, 0);
        assert_eq!(config.intervals.friend_secs, 0);
        // But live knobs are floored
        assert_eq!(config.session.heartbeat_interval_secs, 1);
        assert_eq!(config.session.pending_capacity, 1);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.intervals.farm_secs, config.intervals.farm_secs);
        assert_eq!(parsed.farm.seed_item, config.farm.seed_item);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("intervals:\n  farm-secs: 60\n").unwrap();
        assert_eq!(parsed.intervals.farm_secs, 60);
        assert_eq!(parsed.intervals.friend_secs, IntervalsConfig::default().friend_secs);
        assert_eq!(parsed.patrol.steal_limit, PatrolConfig::default().steal_limit);
    }

    #[test]
    fn test_session_config_conversion() {
        let mut config = Config::default();
        config.session.request_timeout_ms = 2500;
        config.session.heartbeat_interval_secs = 7;

        let session = config.session_config();
        assert_eq!(session.request_timeout, Duration::from_millis(2500));
        assert_eq!(session.heartbeat_interval, Duration::from_secs(7));
    }
}
