//! Command context - the unit-of-work boundary
//!
//! A context owns the entity cache of one unit of work, the first failure
//! recorded while it was active, and the services commands reach the store,
//! clock and event dispatcher through. Nested commands started through
//! [`CommandContext::execute`] either join this context or run in a fresh
//! one, as the context interceptor decides.
//!
//! Closing a context writes its flush plan in one store transaction
//! (inserts, then updates, then deletes), or discards it when a failure has
//! been recorded.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{EntityCache, FlushPlan};
use crate::clock::Clock;
use crate::command::Command;
use crate::config::CommandConfig;
use crate::core_types::ContextId;
use crate::entity::{Entity, Persistable};
use crate::errors::{ExError, FlowXError, Result};
use crate::events::{EventDispatcher, FlowEvent, FlowEventType};
use crate::executor::CommandExecutor;
use crate::model::Loadable;
use crate::store::{DataStore, StoreTransaction};
use crate::{log_op_end, log_op_error, log_op_start};

/// Collaborators shared by every context an executor creates
#[derive(Clone)]
pub struct ContextServices {
    pub store: Arc<dyn DataStore>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventDispatcher>,
}

/// Hooks into the close sequence of one context
///
/// Called in order: `closing` before the flush, `after_flush` once the
/// flush committed, then `closed` on success or `close_failure` when the
/// context ends with a recorded failure.
pub trait CommandContextCloseListener: Send {
    fn closing(&mut self, _ctx: &mut CommandContext) {}

    fn after_flush(&mut self, _ctx: &CommandContext) {}

    fn closed(&mut self, _ctx: &CommandContext) {}

    fn close_failure(&mut self, _ctx: &CommandContext) {}
}

pub struct CommandContext {
    id: ContextId,
    config: CommandConfig,
    command_name: String,
    executor: CommandExecutor,
    cache: EntityCache,
    error: Option<ExError>,
    reused: bool,
    close_listeners: Vec<Box<dyn CommandContextCloseListener>>,
}

impl CommandContext {
    pub(crate) fn new(config: CommandConfig, command_name: &str, executor: CommandExecutor) -> Self {
        let ctx = Self {
            id: ContextId::new(),
            config,
            command_name: command_name.to_string(),
            executor,
            cache: EntityCache::new(),
            error: None,
            reused: false,
            close_listeners: Vec::new(),
        };
        debug!(context_id = %ctx.id, command = command_name, "command context opened");
        ctx
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn config(&self) -> CommandConfig {
        self.config
    }

    /// Command the context was opened for
    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Whether a nested command has joined this context
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub(crate) fn mark_reused(&mut self) {
        self.reused = true;
    }

    pub fn store(&self) -> &dyn DataStore {
        self.executor.services().store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.executor.services().clock.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock().now()
    }

    pub fn events(&self) -> &dyn EventDispatcher {
        self.executor.services().events.as_ref()
    }

    /// Dispatch `event` if the dispatcher is enabled
    pub fn dispatch(&self, event: FlowEvent) {
        let events = self.events();
        if events.is_enabled() {
            events.dispatch(event);
        }
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut EntityCache {
        &mut self.cache
    }

    /// The first failure recorded on this context
    pub fn error(&self) -> Option<&ExError> {
        self.error.as_ref()
    }

    /// Record a failure; the first one wins and later ones are only logged
    pub fn record_error(&mut self, err: ExError) {
        if let Some(first) = &self.error {
            warn!(
                context_id = %self.id,
                first = %first,
                suppressed = %err,
                "later failure suppressed, keeping the first one"
            );
            return;
        }
        self.error = Some(err);
    }

    pub fn add_close_listener(&mut self, listener: impl CommandContextCloseListener + 'static) {
        self.close_listeners.push(Box::new(listener));
    }

    /// Schedule a new entity for insertion
    ///
    /// Entities without an id get a UUIDv7 one.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the identity is already tracked.
    pub fn insert<E: Entity>(&mut self, mut entity: E) -> Result<&mut E> {
        if entity.header().id().is_none() {
            entity
                .header_mut()
                .assign_id(uuid::Uuid::now_v7().to_string())?;
        }
        self.cache.track_new(entity)
    }

    /// Track entities obtained from a store query
    ///
    /// Identities already in the cache keep their cached instance.
    pub fn track_loaded<E: Entity>(&mut self, entity: E) -> &mut E {
        self.cache.track_loaded(entity)
    }

    /// Look an entity up in the cache, falling back to the store
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn find<E: Loadable>(&mut self, id: &str) -> Result<Option<&mut E>> {
        if self.cache.get::<E>(id).is_none() {
            match E::load(self.store(), id)? {
                Some(loaded) => {
                    self.cache.track_loaded(loaded);
                }
                None => return Ok(None),
            }
        }
        Ok(self.cache.get_mut::<E>(id))
    }

    /// Like [`find`](Self::find), but a missing entity is an error
    ///
    /// # Errors
    ///
    /// `NotFound` when neither cache nor store has it.
    pub fn require<E: Loadable>(&mut self, id: &str) -> Result<&mut E> {
        self.find::<E>(id)?.ok_or_else(|| {
            FlowXError::EntityNotFound {
                kind: E::KIND,
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Schedule an entity for deletion
    ///
    /// # Errors
    ///
    /// `NotFound` when neither cache nor store has it.
    pub fn delete<E: Loadable>(&mut self, id: &str) -> Result<()> {
        self.require::<E>(id)?.header_mut().set_deleted(true);
        Ok(())
    }

    /// Run a nested command with the executor's default configuration
    ///
    /// `Ok(None)` means the command joined this context and failed; the
    /// failure is recorded here and surfaces when the owning frame closes.
    ///
    /// # Errors
    ///
    /// Failures of a nested command that ran in its own context.
    pub fn execute<C: Command>(&mut self, command: &C) -> Result<Option<C::Output>> {
        let config = self.executor.default_config();
        self.execute_with(config, command)
    }

    /// # Errors
    ///
    /// Failures of a nested command that ran in its own context.
    pub fn execute_with<C: Command>(
        &mut self,
        config: CommandConfig,
        command: &C,
    ) -> Result<Option<C::Output>> {
        let executor = self.executor.clone();
        executor.dispatch(config, command, Some(self))
    }

    /// Close the context: flush or roll back, then notify listeners
    ///
    /// Returns the first failure recorded on the context, including one
    /// raised by the flush itself.
    pub(crate) fn close(mut self) -> Result<()> {
        let mut listeners = std::mem::take(&mut self.close_listeners);
        for listener in listeners.iter_mut() {
            listener.closing(&mut self);
        }

        if self.error.is_none() {
            if let Err(err) = self.flush() {
                self.record_error(err);
            }
        } else {
            debug!(
                context_id = %self.id,
                discarded = self.cache.len(),
                "command context rolled back"
            );
        }

        if self.error.is_none() {
            for listener in listeners.iter_mut() {
                listener.after_flush(&self);
            }
        }

        for listener in listeners.iter_mut() {
            if self.error.is_some() {
                listener.close_failure(&self);
            } else {
                listener.closed(&self);
            }
        }

        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn flush(&self) -> Result<()> {
        let plan = self.cache.flush_plan()?;
        if plan.is_empty() {
            return Ok(());
        }

        log_op_start!(
            "flush",
            context_id = %self.id,
            inserts = plan.inserts.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len()
        );
        let start = std::time::Instant::now();

        let mut tx = self.store().begin()?;
        let written = write_plan(tx.as_mut(), &plan);
        let outcome = match written {
            Ok(()) => tx.commit(),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(context_id = %self.id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        };

        match outcome {
            Ok(()) => {
                log_op_end!(
                    "flush",
                    duration_ms = start.elapsed().as_millis() as u64,
                    context_id = %self.id
                );
                self.dispatch_flushed(&plan);
                Ok(())
            }
            Err(err) => {
                log_op_error!(
                    "flush",
                    &err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    context_id = %self.id
                );
                Err(err)
            }
        }
    }

    fn dispatch_flushed(&self, plan: &FlushPlan<'_>) {
        for entity in &plan.inserts {
            self.dispatch(entity_event(FlowEventType::EntityCreated, *entity));
        }
        for entity in &plan.deletes {
            self.dispatch(entity_event(FlowEventType::EntityDeleted, *entity));
        }
    }
}

fn write_plan(tx: &mut (dyn StoreTransaction + '_), plan: &FlushPlan<'_>) -> Result<()> {
    for entity in &plan.inserts {
        tx.insert(*entity)?;
    }
    for entity in &plan.updates {
        tx.update(*entity)?;
    }
    for entity in &plan.deletes {
        tx.delete(*entity)?;
    }
    Ok(())
}

fn entity_event(event_type: FlowEventType, entity: &dyn Persistable) -> FlowEvent {
    FlowEvent::entity(
        event_type,
        entity.entity_kind(),
        entity.entity_header().id().unwrap_or_default(),
    )
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("id", &self.id)
            .field("command", &self.command_name)
            .field("reused", &self.reused)
            .field("error", &self.error)
            .field("cached", &self.cache.len())
            .finish()
    }
}
