//! Command executor - entry point of the pipeline
//!
//! The executor owns the interceptor chain and the services contexts are
//! built with. It is cheap to clone; every context keeps a clone so nested
//! commands run through the same chain.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::command::{Command, Slot};
use crate::config::{CommandConfig, RetryConfig};
use crate::context::{CommandContext, ContextServices};
use crate::errors::{ExError, ExErrorKind, Result};
use crate::events::{EventDispatcher, NoopDispatcher};
use crate::interceptor::{
    CommandInterceptor, CommandInvoker, ContextInterceptor, Invocation, LogInterceptor, Next,
    RetryInterceptor,
};
use crate::store::DataStore;

#[derive(Clone)]
pub struct CommandExecutor {
    chain: Arc<[Arc<dyn CommandInterceptor>]>,
    services: ContextServices,
    default_config: CommandConfig,
}

impl CommandExecutor {
    pub fn builder(store: Arc<dyn DataStore>) -> CommandExecutorBuilder {
        CommandExecutorBuilder::new(store)
    }

    pub fn default_config(&self) -> CommandConfig {
        self.default_config
    }

    pub fn services(&self) -> &ContextServices {
        &self.services
    }

    /// Interceptor names in chain order
    pub fn chain_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|i| i.name()).collect()
    }

    /// Run `command` with the default configuration
    ///
    /// # Errors
    ///
    /// The first failure recorded on the command's context, including a
    /// failed flush.
    pub fn execute<C: Command>(&self, command: &C) -> Result<C::Output> {
        self.execute_with(self.default_config, command)
    }

    /// Run `command` with an explicit configuration
    ///
    /// # Errors
    ///
    /// The first failure recorded on the command's context, including a
    /// failed flush. `IllegalState` if an interceptor short-circuited the
    /// chain without producing a result.
    pub fn execute_with<C: Command>(&self, config: CommandConfig, command: &C) -> Result<C::Output> {
        self.dispatch(config, command, None)?.ok_or_else(|| {
            ExError::new(ExErrorKind::IllegalState)
                .with_op(command.name().to_string())
                .with_message("command completed without producing a result")
        })
    }

    /// Drive `command` through the chain with `current` as the enclosing
    /// context
    pub(crate) fn dispatch<C: Command>(
        &self,
        config: CommandConfig,
        command: &C,
        current: Option<&mut CommandContext>,
    ) -> Result<Option<C::Output>> {
        let mut slot = Slot::new(command);
        {
            let mut invocation = Invocation::new(&mut slot, current, self);
            Next::new(&self.chain).run(config, &mut invocation)?;
        }
        Ok(slot.into_output())
    }
}

/// Assembles the chain: custom pre interceptors, log, optional retry,
/// context, custom post interceptors, invoker
pub struct CommandExecutorBuilder {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventDispatcher>,
    default_config: CommandConfig,
    retry: Option<RetryConfig>,
    pre: Vec<Arc<dyn CommandInterceptor>>,
    post: Vec<Arc<dyn CommandInterceptor>>,
}

impl CommandExecutorBuilder {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopDispatcher),
            default_config: CommandConfig::default(),
            retry: None,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(mut self, events: Arc<dyn EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    pub fn default_config(mut self, config: CommandConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Retry commands that lose an optimistic-lock race
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Interceptor running before the built-in ones
    pub fn pre_interceptor(mut self, interceptor: Arc<dyn CommandInterceptor>) -> Self {
        self.pre.push(interceptor);
        self
    }

    /// Interceptor running inside the context, just before the command
    pub fn post_interceptor(mut self, interceptor: Arc<dyn CommandInterceptor>) -> Self {
        self.post.push(interceptor);
        self
    }

    pub fn build(self) -> CommandExecutor {
        let mut chain: Vec<Arc<dyn CommandInterceptor>> = self.pre;
        chain.push(Arc::new(LogInterceptor));
        if let Some(retry) = self.retry {
            chain.push(Arc::new(RetryInterceptor::new(retry)));
        }
        chain.push(Arc::new(ContextInterceptor::new()));
        chain.extend(self.post);
        chain.push(Arc::new(CommandInvoker));

        CommandExecutor {
            chain: chain.into(),
            services: ContextServices {
                store: self.store,
                clock: self.clock,
                events: self.events,
            },
            default_config: self.default_config,
        }
    }
}
