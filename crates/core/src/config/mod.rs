// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Loaded from a single TOML file shared by `loyd` and `loy`. Every section
//! is optional and falls back to defaults.

use crate::offer::{Offer, OfferType};
use crate::reward::{Reward, RewardCatalog};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyConfig {
    pub store: StoreConfig,
    pub daemon: DaemonConfig,
    pub jobs: JobsConfig,
    pub sync: SyncConfig,
    pub redemption: RedemptionConfig,
    pub platform: PlatformConfig,
    #[serde(rename = "reward")]
    pub rewards: Vec<Reward>,
    /// Offers seeded into the store when the daemon starts
    #[serde(rename = "offer")]
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the ledger WAL
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".loyalty"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unix socket path; defaults to `<data_dir>/loyd.sock`
    pub socket_path: Option<PathBuf>,
    /// Log file path; defaults to `<data_dir>/loyd.log`
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    #[serde(with = "humantime_serde")]
    pub accrual_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub offer_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub reconcile_interval: Duration,
    /// Customers processed concurrently within one batch run
    pub parallelism: usize,
    /// Shards in the per-customer lock table
    pub lock_shards: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            accrual_interval: Duration::from_secs(15 * 60),
            offer_interval: Duration::from_secs(60 * 60),
            reconcile_interval: Duration::from_secs(6 * 60 * 60),
            parallelism: 8,
            lock_shards: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Pending sync tasks buffered before producers start dropping
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedemptionConfig {
    /// Internal retries after a ledger concurrency conflict
    pub conflict_retries: u32,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the commerce platform bridge; `None` runs offline
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            access_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl LoyaltyConfig {
    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: LoyaltyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.parallelism == 0 {
            return Err(ConfigError::Invalid("jobs.parallelism must be > 0".into()));
        }
        if self.jobs.lock_shards == 0 {
            return Err(ConfigError::Invalid("jobs.lock_shards must be > 0".into()));
        }
        if self.sync.max_attempts == 0 {
            return Err(ConfigError::Invalid("sync.max_attempts must be > 0".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for reward in &self.rewards {
            if reward.points_cost <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "reward {} must cost a positive number of points",
                    reward.id
                )));
            }
            if !seen.insert(&reward.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate reward id: {}",
                    reward.id
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for offer in &self.offers {
            if !seen.insert(&offer.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate offer id: {}",
                    offer.id
                )));
            }
            if offer.offer_type == OfferType::Cashback {
                offer
                    .cashback_ratio()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
            if let (Some(start), Some(end)) = (offer.starts_at, offer.ends_at) {
                if end < start {
                    return Err(ConfigError::Invalid(format!(
                        "offer {} ends before it starts",
                        offer.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn catalog(&self) -> RewardCatalog {
        RewardCatalog::new(self.rewards.iter().cloned())
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(|| self.store.data_dir.join("loyd.sock"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.daemon
            .log_path
            .clone()
            .unwrap_or_else(|| self.store.data_dir.join("loyd.log"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.store.data_dir.join("loyd.pid")
    }

    pub fn wal_path(&self) -> PathBuf {
        self.store.data_dir.join("ledger.wal")
    }
}
