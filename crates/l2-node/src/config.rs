//! # Node Configuration
//!
//! Defaults suitable for a local devnet, overridable through `L2_*`
//! environment variables.
//!
//! ## Security Requirements
//!
//! - At least one validator must be configured
//! - The watchdog identity must not also be a validator

use l2_settlement::SettlementConfig;
use shared_types::Address;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Coordinator parameters.
    pub settlement: SettlementConfig,
    /// Validators admitted at start-up.
    pub validators: Vec<Address>,
    pub storage: StorageConfig,
    pub liveness: LivenessConfig,
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the coordinator snapshot.
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("settlement.snapshot")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Liveness loop configuration.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Root-chain block interval used by the wall-clock height source.
    pub height_interval_ms: u64,
    /// How often the loop checks for expired blocks.
    pub tick_interval_ms: u64,
    /// Consecutive expiry reverts before the watchdog triggers exodus.
    pub watchdog_expiry_limit: u64,
    /// Holders drained per tick once exodus is active.
    pub drain_batch: u64,
}

impl LivenessConfig {
    pub fn height_interval(&self) -> Duration {
        Duration::from_millis(self.height_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            height_interval_ms: 12_000,
            tick_interval_ms: 1_000,
            watchdog_expiry_limit: 3,
            drain_batch: 256,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("no validators configured. Set L2_VALIDATORS to a comma-separated list of addresses.")]
    NoValidators,

    #[error("watchdog {watchdog} is also configured as a validator")]
    WatchdogIsValidator { watchdog: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

impl NodeConfig {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`. Unset variables keep their defaults.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("L2_EXPIRY_THRESHOLD") {
            self.settlement.expiry_threshold = parse_number("L2_EXPIRY_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("L2_MAX_UNVERIFIED") {
            self.settlement.max_unverified_blocks = parse_number("L2_MAX_UNVERIFIED", &value)?;
        }
        if let Some(value) = lookup("L2_DEPOSIT_MATURATION") {
            self.settlement.deposit_maturation = parse_number("L2_DEPOSIT_MATURATION", &value)?;
        }
        if let Some(value) = lookup("L2_WATCHDOG") {
            self.settlement.watchdog = parse_address("L2_WATCHDOG", &value)?;
        }
        if let Some(value) = lookup("L2_VALIDATORS") {
            self.validators = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_address("L2_VALIDATORS", s))
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = lookup("L2_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("L2_WATCHDOG_EXPIRY_LIMIT") {
            self.liveness.watchdog_expiry_limit = parse_number("L2_WATCHDOG_EXPIRY_LIMIT", &value)?;
        }
        if let Some(value) = lookup("L2_HEIGHT_INTERVAL_MS") {
            self.liveness.height_interval_ms = parse_number("L2_HEIGHT_INTERVAL_MS", &value)?;
        }
        Ok(())
    }

    /// Reject configurations the node cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validators.is_empty() {
            return Err(ConfigError::NoValidators);
        }
        if self.validators.contains(&self.settlement.watchdog) {
            return Err(ConfigError::WatchdogIsValidator {
                watchdog: hex::encode(self.settlement.watchdog),
            });
        }
        let positive = [
            ("expiry_threshold", self.settlement.expiry_threshold),
            ("max_unverified_blocks", self.settlement.max_unverified_blocks),
            ("height_interval_ms", self.liveness.height_interval_ms),
            ("tick_interval_ms", self.liveness.tick_interval_ms),
            ("watchdog_expiry_limit", self.liveness.watchdog_expiry_limit),
            ("drain_batch", self.liveness.drain_batch),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

/// Parse a 20-byte address, with or without a `0x` prefix.
pub fn parse_address(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}
