//! Process engine - wires store, executor, job manager and acquisition

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flowx_core::clock::{Clock, SystemClock};
use flowx_core::events::{EventDispatcher, FlowEvent, FlowEventType, NoopDispatcher};
use flowx_core::model::{DeploymentEntity, JobPayload, TimerJobEntity};
use flowx_core::{CommandExecutor, DataStore, Result};
use flowx_store::SqliteStore;
use tracing::info;

use crate::async_executor::AsyncExecutor;
use crate::commands::{DeployCmd, ScheduleTimerJobCmd};
use crate::config::EngineConfig;
use crate::job_manager::JobManager;

pub struct ProcessEngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn DataStore>>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventDispatcher>,
}

impl ProcessEngineBuilder {
    /// Use this store instead of opening the one the config names
    pub fn store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(mut self, events: Arc<dyn EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    /// Validate the config, open the store and start acquisition if the
    /// config asks for it
    ///
    /// # Errors
    ///
    /// `Config` for rejected settings, persistence failures opening the
    /// store, `Internal` when the acquisition thread cannot be spawned.
    pub fn build(self) -> Result<ProcessEngine> {
        let config = self.config;
        config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => open_store(&config)?,
        };

        let mut executor = CommandExecutor::builder(store)
            .clock(self.clock)
            .events(self.events.clone())
            .default_config(config.command);
        if let Some(retry) = config.retry {
            executor = executor.retry(retry);
        }
        let executor = executor.build();

        let job_manager = JobManager::new(config.async_executor.resolve_lock_owner());
        let async_executor = AsyncExecutor::new(
            executor.clone(),
            job_manager.clone(),
            config.async_executor.clone(),
        );

        let engine = ProcessEngine {
            config,
            executor,
            job_manager,
            async_executor,
            events: self.events,
            closed: AtomicBool::new(false),
        };
        engine.dispatch(FlowEventType::EngineCreated);
        info!(engine = %engine.config.name, "process engine created");

        if engine.config.async_executor.auto_activate {
            engine.async_executor.start()?;
        }
        Ok(engine)
    }
}

fn open_store(config: &EngineConfig) -> Result<Arc<dyn DataStore>> {
    let store = match &config.store.database_path {
        Some(path) => SqliteStore::open(path, config.store.busy_timeout())?,
        None => SqliteStore::open_in_memory()?,
    };
    Ok(Arc::new(store))
}

pub struct ProcessEngine {
    config: EngineConfig,
    executor: CommandExecutor,
    job_manager: JobManager,
    async_executor: AsyncExecutor,
    events: Arc<dyn EventDispatcher>,
    closed: AtomicBool,
}

impl ProcessEngine {
    pub fn builder(config: EngineConfig) -> ProcessEngineBuilder {
        ProcessEngineBuilder {
            config,
            store: None,
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopDispatcher),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn job_manager(&self) -> &JobManager {
        &self.job_manager
    }

    pub fn async_executor(&self) -> &AsyncExecutor {
        &self.async_executor
    }

    pub fn store(&self) -> &dyn DataStore {
        self.executor.services().store.as_ref()
    }

    /// # Errors
    ///
    /// Failures of the scheduling command.
    pub fn schedule_timer(
        &self,
        due_date: DateTime<Utc>,
        payload: JobPayload,
    ) -> Result<TimerJobEntity> {
        self.executor
            .execute(&ScheduleTimerJobCmd::new(&self.job_manager, due_date, payload))
    }

    /// # Errors
    ///
    /// Failures of the deploy command.
    pub fn deploy(&self, deploy: DeployCmd) -> Result<DeploymentEntity> {
        self.executor.execute(&deploy)
    }

    /// Stop acquisition and announce the shutdown; later calls do nothing
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.async_executor.shutdown();
        self.dispatch(FlowEventType::EngineClosed);
        info!(engine = %self.config.name, "process engine closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn dispatch(&self, event_type: FlowEventType) {
        if self.events.is_enabled() {
            self.events.dispatch(FlowEvent::engine(event_type));
        }
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProcessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("name", &self.config.name)
            .field("async_executor", &self.async_executor)
            .field("closed", &self.is_closed())
            .finish()
    }
}
