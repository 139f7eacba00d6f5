//! Interceptor chain
//!
//! Every command passes through an ordered list of interceptors composed
//! when the executor is built. Each interceptor receives the invocation and
//! a [`Next`] handle for the rest of the chain; calling it continues, not
//! calling it short-circuits.
//!
//! The invocation carries the current context frame. A frame is either the
//! enclosing context of a nested call or a context owned by this invocation;
//! the Rust call stack is the context stack, so a frame pushed by an
//! interceptor is popped when that interceptor returns.

mod context;
mod invoker;
mod log;
mod retry;

pub use context::ContextInterceptor;
pub use invoker::CommandInvoker;
pub use log::LogInterceptor;
pub use retry::RetryInterceptor;

use std::sync::Arc;

use crate::command::ErasedCommand;
use crate::config::CommandConfig;
use crate::context::CommandContext;
use crate::errors::{ExError, ExErrorKind, Result};
use crate::executor::CommandExecutor;

pub trait CommandInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Whatever the rest of the chain reports, unless this interceptor
    /// absorbs it.
    fn execute(
        &self,
        config: CommandConfig,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> Result<()>;
}

/// The remainder of the chain after the current interceptor
#[derive(Clone, Copy)]
pub struct Next<'c> {
    rest: &'c [Arc<dyn CommandInterceptor>],
}

impl<'c> Next<'c> {
    pub(crate) fn new(chain: &'c [Arc<dyn CommandInterceptor>]) -> Self {
        Self { rest: chain }
    }

    /// Run the next interceptor
    ///
    /// # Errors
    ///
    /// `IllegalState` when the chain ends without a terminal interceptor,
    /// otherwise whatever the next interceptor returns.
    pub fn run(self, config: CommandConfig, invocation: &mut Invocation<'_>) -> Result<()> {
        match self.rest.split_first() {
            Some((head, rest)) => head.execute(config, invocation, Next { rest }),
            None => Err(ExError::new(ExErrorKind::IllegalState)
                .with_op(invocation.command_name().to_string())
                .with_message("interceptor chain ended without invoking the command")),
        }
    }
}

pub(crate) enum ContextFrame<'a> {
    Enclosing(&'a mut CommandContext),
    Owned(Box<CommandContext>),
}

impl ContextFrame<'_> {
    fn context(&self) -> &CommandContext {
        match self {
            ContextFrame::Enclosing(ctx) => &**ctx,
            ContextFrame::Owned(ctx) => &**ctx,
        }
    }

    fn context_mut(&mut self) -> &mut CommandContext {
        match self {
            ContextFrame::Enclosing(ctx) => &mut **ctx,
            ContextFrame::Owned(ctx) => &mut **ctx,
        }
    }
}

/// One command on its way through the chain
pub struct Invocation<'a> {
    command: &'a mut dyn ErasedCommand,
    frame: Option<ContextFrame<'a>>,
    executor: &'a CommandExecutor,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        command: &'a mut dyn ErasedCommand,
        current: Option<&'a mut CommandContext>,
        executor: &'a CommandExecutor,
    ) -> Self {
        Self {
            command,
            frame: current.map(ContextFrame::Enclosing),
            executor,
        }
    }

    pub fn command_name(&self) -> &str {
        self.command.name()
    }

    pub fn executor(&self) -> &CommandExecutor {
        self.executor
    }

    /// The current context, if any interceptor or caller established one
    pub fn context(&self) -> Option<&CommandContext> {
        self.frame.as_ref().map(ContextFrame::context)
    }

    pub fn context_mut(&mut self) -> Option<&mut CommandContext> {
        self.frame.as_mut().map(ContextFrame::context_mut)
    }

    /// Execute the command against the current context
    ///
    /// # Errors
    ///
    /// `IllegalState` without a current context, otherwise the command's
    /// own failure.
    pub fn run_command(&mut self) -> Result<()> {
        match self.frame.as_mut() {
            Some(frame) => self.command.run(frame.context_mut()),
            None => Err(ExError::new(ExErrorKind::IllegalState)
                .with_op(self.command.name().to_string())
                .with_message("no command context is active")),
        }
    }

    /// Make `ctx` current; returns the frame it shadows
    pub(crate) fn push_context(&mut self, ctx: CommandContext) -> Option<ContextFrame<'a>> {
        self.frame.replace(ContextFrame::Owned(Box::new(ctx)))
    }

    /// Restore the shadowed frame and hand back the context pushed over it
    pub(crate) fn pop_context(
        &mut self,
        shadowed: Option<ContextFrame<'a>>,
    ) -> Result<Box<CommandContext>> {
        match std::mem::replace(&mut self.frame, shadowed) {
            Some(ContextFrame::Owned(ctx)) => Ok(ctx),
            _ => Err(ExError::new(ExErrorKind::Internal)
                .with_op(self.command.name().to_string())
                .with_message("context stack out of balance")),
        }
    }
}
