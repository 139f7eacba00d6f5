use super::{CommandInterceptor, Invocation, Next};
use crate::config::CommandConfig;
use crate::errors::Result;
use crate::{log_op_end, log_op_error, log_op_start};

const OP: &str = "execute_command";

/// Logs every command with its duration
#[derive(Debug, Default)]
pub struct LogInterceptor;

impl CommandInterceptor for LogInterceptor {
    fn name(&self) -> &'static str {
        "log"
    }

    fn execute(
        &self,
        config: CommandConfig,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> Result<()> {
        let command = invocation.command_name().to_string();
        let nested = invocation.context().is_some();
        log_op_start!(OP, command = %command, nested = nested);
        let start = std::time::Instant::now();

        next.run(config, invocation).map_err(|e| {
            log_op_error!(
                OP,
                &e,
                duration_ms = start.elapsed().as_millis() as u64,
                command = %command
            );
            e
        })?;

        log_op_end!(
            OP,
            duration_ms = start.elapsed().as_millis() as u64,
            command = %command
        );
        Ok(())
    }
}
