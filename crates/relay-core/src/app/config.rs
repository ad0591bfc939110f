//! DispatcherConfig - TOML から読む dispatcher 設定
//!
//! ```toml
//! [transaction]
//! mode = "requires_new"      # requires_new | required | suppress | none
//! isolation = "serializable"
//! timeout_secs = 600
//! unbounded_timeout = false  # 対話デバッグ用。本番では使わない
//!
//! [dedup]
//! capacity = 1024
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dedup::EnvelopeDedup;
use super::policy::{TransactionPolicy, TransactionSettings};
use crate::ports::{IsolationLevel, ScopeOption, TransactionManager};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("dedup capacity must be greater than zero")]
    ZeroDedupCapacity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    #[default]
    RequiresNew,
    Required,
    Suppress,
    /// No boundary at all; the manager is never consulted.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub mode: TransactionMode,
    pub isolation: IsolationLevel,
    pub timeout_secs: Option<u64>,
    pub unbounded_timeout: bool,
}

impl TransactionConfig {
    pub fn settings(&self) -> TransactionSettings {
        TransactionSettings {
            isolation_level: self.isolation,
            timeout: self.timeout_secs.map(Duration::from_secs),
            unbounded_timeout: self.unbounded_timeout,
        }
    }

    pub fn policy(&self, manager: Arc<dyn TransactionManager>) -> TransactionPolicy {
        let option = match self.mode {
            TransactionMode::RequiresNew => ScopeOption::RequiresNew,
            TransactionMode::Required => ScopeOption::Required,
            TransactionMode::Suppress => ScopeOption::Suppress,
            TransactionMode::None => return TransactionPolicy::no_transactions(),
        };
        TransactionPolicy::managed(manager, option, self.settings())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub transaction: TransactionConfig,
    pub dedup: Option<DedupConfig>,
}

impl DispatcherConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dedup) = &self.dedup
            && dedup.capacity == 0
        {
            return Err(ConfigError::ZeroDedupCapacity);
        }
        Ok(())
    }

    pub fn dedup(&self) -> Result<Option<EnvelopeDedup>, ConfigError> {
        match &self.dedup {
            Some(dedup) => {
                let capacity =
                    NonZeroUsize::new(dedup.capacity).ok_or(ConfigError::ZeroDedupCapacity)?;
                Ok(Some(EnvelopeDedup::new(capacity)))
            }
            None => Ok(None),
        }
    }
}
