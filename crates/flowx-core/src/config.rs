//! Per-invocation command options
//!
//! Engine-wide settings (acquisition, store, retry defaults) are loaded from
//! TOML by the engine crate; this module holds the parts the command
//! pipeline itself consults.

use serde::{Deserialize, Serialize};

use crate::errors::{FlowXError, Result};

/// Options recognized by the command executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Nested invocations may join the enclosing context
    pub context_reuse_possible: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            context_reuse_possible: true,
        }
    }
}

impl CommandConfig {
    /// Always run in a fresh context of its own
    pub fn transaction_requires_new(self) -> Self {
        Self {
            context_reuse_possible: false,
        }
    }

    pub fn with_context_reuse(mut self, possible: bool) -> Self {
        self.context_reuse_possible = possible;
        self
    }
}

/// Backoff for commands that lost an optimistic-lock race
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub num_retries: u32,
    pub wait_time_ms: u64,
    pub wait_increase_factor: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            num_retries: 3,
            wait_time_ms: 50,
            wait_increase_factor: 5,
        }
    }
}

impl RetryConfig {
    /// Pause before retry number `attempt` (0-based)
    pub fn wait_before(&self, attempt: u32) -> u64 {
        self.wait_time_ms
            .saturating_mul(u64::from(self.wait_increase_factor).saturating_pow(attempt))
    }

    /// # Errors
    ///
    /// `InvalidConfig` when the increase factor is zero.
    pub fn validate(&self) -> Result<()> {
        if self.wait_increase_factor == 0 {
            return Err(FlowXError::InvalidConfig {
                field: "retry.wait_increase_factor".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_new_disables_reuse() {
        let config = CommandConfig::default();
        assert!(config.context_reuse_possible);
        assert!(!config.transaction_requires_new().context_reuse_possible);
    }

    #[test]
    fn test_retry_wait_grows_geometrically() {
        let retry = RetryConfig {
            num_retries: 3,
            wait_time_ms: 10,
            wait_increase_factor: 3,
        };
        assert_eq!(retry.wait_before(0), 10);
        assert_eq!(retry.wait_before(1), 30);
        assert_eq!(retry.wait_before(2), 90);
    }

    #[test]
    fn test_zero_increase_factor_rejected() {
        let retry = RetryConfig {
            wait_increase_factor: 0,
            ..RetryConfig::default()
        };
        assert!(retry.validate().is_err());
    }
}
