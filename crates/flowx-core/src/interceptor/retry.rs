use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{CommandInterceptor, Invocation, Next};
use crate::config::{CommandConfig, RetryConfig};
use crate::errors::Result;

/// Re-runs a command that lost an optimistic-lock race
///
/// Sits in front of the context interceptor, so every attempt gets a fresh
/// context. Only top-level invocations are retried: a command started from
/// inside another context, even with `transaction_requires_new()`, runs once
/// and leaves the retry decision to the outermost command. Other failures
/// pass through untouched; after the last retry the final conflict is
/// returned as-is.
#[derive(Debug, Clone, Default)]
pub struct RetryInterceptor {
    retry: RetryConfig,
}

impl RetryInterceptor {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }
}

impl CommandInterceptor for RetryInterceptor {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn execute(
        &self,
        config: CommandConfig,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> Result<()> {
        if invocation.context().is_some() {
            return next.run(config, invocation);
        }

        let mut attempt = 0;
        loop {
            match next.run(config, invocation) {
                Err(err) if err.is_optimistic_lock() && attempt < self.retry.num_retries => {
                    let wait_ms = self.retry.wait_before(attempt);
                    attempt += 1;
                    debug!(
                        command = invocation.command_name(),
                        attempt,
                        wait_ms,
                        "optimistic lock conflict, retrying command"
                    );
                    thread::sleep(Duration::from_millis(wait_ms));
                }
                other => return other,
            }
        }
    }
}
