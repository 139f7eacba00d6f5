//! Engine configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty
//! document is a valid configuration.
//!
//! ```toml
//! name = "node-a"
//!
//! [async_executor]
//! max_timer_jobs_per_acquisition = 10
//! default_timer_job_acquire_wait_ms = 10000
//!
//! [store]
//! database_path = "flowx.db"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use flowx_core_types::LockOwner;
use flowx_core::errors::{ExError, ExErrorKind, FlowXError, Result};
use flowx_core::{CommandConfig, RetryConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    /// Defaults for commands run without an explicit config
    pub command: CommandConfig,
    /// Retry commands that lose an optimistic-lock race; off when absent
    pub retry: Option<RetryConfig>,
    pub async_executor: AsyncExecutorConfig,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            command: CommandConfig::default(),
            retry: None,
            async_executor: AsyncExecutorConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Longest claim a timer may carry (one week)
pub const MAX_TIMER_LOCK_TIME_MS: u64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncExecutorConfig {
    /// Upper bound of timers claimed per acquisition cycle
    pub max_timer_jobs_per_acquisition: usize,
    /// Pause between cycles that did not fill a batch
    pub default_timer_job_acquire_wait_ms: u64,
    /// How long a claim stays valid before others may take the timer over
    pub timer_lock_time_ms: u64,
    /// Claim marker written into acquired timers; random per start when unset
    pub lock_owner: Option<String>,
    /// Start the acquisition thread when the engine is built
    pub auto_activate: bool,
}

impl Default for AsyncExecutorConfig {
    fn default() -> Self {
        Self {
            max_timer_jobs_per_acquisition: 1,
            default_timer_job_acquire_wait_ms: 10_000,
            timer_lock_time_ms: 300_000,
            lock_owner: None,
            auto_activate: false,
        }
    }
}

impl AsyncExecutorConfig {
    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_timer_job_acquire_wait_ms)
    }

    /// Claim duration, capped at [`MAX_TIMER_LOCK_TIME_MS`]
    pub fn timer_lock_time(&self) -> chrono::Duration {
        let millis = self.timer_lock_time_ms.min(MAX_TIMER_LOCK_TIME_MS);
        chrono::Duration::milliseconds(i64::try_from(millis).unwrap_or(0))
    }

    /// The configured lock owner, or a fresh random one
    pub fn resolve_lock_owner(&self) -> LockOwner {
        match &self.lock_owner {
            Some(name) => LockOwner::named(name.clone()),
            None => LockOwner::generate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file; in-memory when unset
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// `Config` for malformed TOML or rejected values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source).map_err(|e| {
            ExError::new(ExErrorKind::Config)
                .with_op("load_config")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    ///
    /// `Config` naming the first rejected field.
    pub fn validate(&self) -> Result<()> {
        if self.async_executor.max_timer_jobs_per_acquisition == 0 {
            return Err(invalid(
                "async_executor.max_timer_jobs_per_acquisition",
                "must be at least 1",
            ));
        }
        if self.async_executor.timer_lock_time_ms == 0 {
            return Err(invalid(
                "async_executor.timer_lock_time_ms",
                "must be greater than zero",
            ));
        }
        if self.async_executor.timer_lock_time_ms > MAX_TIMER_LOCK_TIME_MS {
            return Err(invalid(
                "async_executor.timer_lock_time_ms",
                "must not exceed one week",
            ));
        }
        if let Some(owner) = &self.async_executor.lock_owner {
            if owner.trim().is_empty() {
                return Err(invalid("async_executor.lock_owner", "must not be blank"));
            }
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ExError {
    FlowXError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
