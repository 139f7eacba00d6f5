use tracing::debug;

use super::{CommandInterceptor, Invocation, Next};
use crate::config::CommandConfig;
use crate::context::CommandContext;
use crate::errors::Result;

/// Establishes the unit of work a command runs in
///
/// A nested invocation joins the current context when reuse is allowed and
/// that context has not recorded a failure yet. Otherwise a fresh context is
/// pushed for the duration of the call and closed (flushed or rolled back)
/// by this frame before it is popped.
///
/// Failures from further down the chain are recorded on the context rather
/// than returned. For an owned context the recorded failure comes back out
/// of `close`; a reusing frame returns `Ok` without output and leaves the
/// failure for the owning frame to report.
#[derive(Debug, Default)]
pub struct ContextInterceptor;

impl ContextInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandInterceptor for ContextInterceptor {
    fn name(&self) -> &'static str {
        "context"
    }

    fn execute(
        &self,
        config: CommandConfig,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> Result<()> {
        let reusable = config.context_reuse_possible
            && invocation
                .context()
                .is_some_and(|current| current.error().is_none());

        if reusable {
            let command = invocation.command_name().to_string();
            if let Some(current) = invocation.context_mut() {
                debug!(
                    context_id = %current.id(),
                    command = %command,
                    "reusing command context"
                );
                current.mark_reused();
            }
            if let Err(err) = next.run(config, invocation) {
                if let Some(current) = invocation.context_mut() {
                    current.record_error(err);
                }
            }
            return Ok(());
        }

        let ctx = CommandContext::new(
            config,
            invocation.command_name(),
            invocation.executor().clone(),
        );
        let shadowed = invocation.push_context(ctx);
        let result = next.run(config, invocation);
        let mut ctx = invocation.pop_context(shadowed)?;
        if let Err(err) = result {
            ctx.record_error(err);
        }
        (*ctx).close()
    }
}
