use super::{CommandInterceptor, Invocation, Next};
use crate::config::CommandConfig;
use crate::errors::Result;

/// Terminal interceptor: runs the command against the current context
#[derive(Debug, Default)]
pub struct CommandInvoker;

impl CommandInterceptor for CommandInvoker {
    fn name(&self) -> &'static str {
        "invoker"
    }

    fn execute(
        &self,
        _config: CommandConfig,
        invocation: &mut Invocation<'_>,
        _next: Next<'_>,
    ) -> Result<()> {
        invocation.run_command()
    }
}
