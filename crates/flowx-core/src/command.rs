//! Commands
//!
//! A command is a unit of work executed against the current
//! [`CommandContext`]. The executor drives it through the interceptor chain,
//! which is typed only in terms of [`ErasedCommand`]; the command's output is
//! parked in a [`Slot`] until the chain returns.

use std::marker::PhantomData;

use crate::context::CommandContext;
use crate::errors::Result;

pub trait Command {
    type Output;

    /// Name used in logs; defaults to the bare type name
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// # Errors
    ///
    /// Whatever the command's logic reports; the surrounding context records
    /// it and rolls back.
    fn execute(&self, ctx: &mut CommandContext) -> Result<Self::Output>;
}

fn short_type_name(full: &str) -> &str {
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path)
}

/// Command built from a closure
pub struct FnCommand<F, T> {
    name: &'static str,
    body: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> Command for FnCommand<F, T>
where
    F: Fn(&mut CommandContext) -> Result<T>,
{
    type Output = T;

    fn name(&self) -> &str {
        self.name
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<T> {
        (self.body)(ctx)
    }
}

/// Wrap a closure as a named command
///
/// ```
/// use flowx_core::command_fn;
///
/// let cmd = command_fn("count_cached", |ctx| Ok(ctx.cache().len()));
/// # let _ = cmd;
/// ```
pub fn command_fn<F, T>(name: &'static str, body: F) -> FnCommand<F, T>
where
    F: Fn(&mut CommandContext) -> Result<T>,
{
    FnCommand {
        name,
        body,
        _output: PhantomData,
    }
}

/// Object-safe view of a command travelling through the chain
pub(crate) trait ErasedCommand {
    fn name(&self) -> &str;

    /// Run the command and keep its output; a rerun replaces the output
    fn run(&mut self, ctx: &mut CommandContext) -> Result<()>;
}

pub(crate) struct Slot<'c, C: Command> {
    command: &'c C,
    output: Option<C::Output>,
}

impl<'c, C: Command> Slot<'c, C> {
    pub(crate) fn new(command: &'c C) -> Self {
        Self {
            command,
            output: None,
        }
    }

    pub(crate) fn into_output(self) -> Option<C::Output> {
        self.output
    }
}

impl<C: Command> ErasedCommand for Slot<'_, C> {
    fn name(&self) -> &str {
        self.command.name()
    }

    fn run(&mut self, ctx: &mut CommandContext) -> Result<()> {
        self.output = None;
        self.output = Some(self.command.execute(ctx)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcquireThings;

    impl Command for AcquireThings {
        type Output = ();

        fn execute(&self, _ctx: &mut CommandContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_name_is_bare_type_name() {
        assert_eq!(AcquireThings.name(), "AcquireThings");
    }

    #[test]
    fn test_short_type_name_strips_generics() {
        assert_eq!(short_type_name("a::b::Wrapper<c::d::Inner>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_command_fn_keeps_name() {
        let cmd = command_fn("noop", |_ctx| Ok(1));
        assert_eq!(cmd.name(), "noop");
    }
}
