use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use flowx_core::clock::FixedClock;
use flowx_core::errors::{ExError, ExErrorKind};
use flowx_core::events::{ListenerDispatcher, RecordingListener};
use flowx_core::interceptor::{CommandInterceptor, Invocation, Next};
use flowx_core::model::{JobPayload, TimerJobEntity};
use flowx_core::store::{DataStore, MemoryStore};
use flowx_core::{CommandConfig, CommandExecutor, CommandExecutorBuilder, Entity, Result};
use flowx_core_types::LockOwner;
use flowx_engine::{AsyncExecutorConfig, JobManager, TimerAcquisitionLoop};

/// Fixed "now" used across tests
#[allow(dead_code)]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// One engine node: its executor and acquisition loop over a shared store
#[allow(dead_code)]
pub struct Node {
    pub executor: CommandExecutor,
    pub acquisition: Arc<TimerAcquisitionLoop>,
}

#[allow(dead_code)]
pub struct Cluster {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub dispatcher: Arc<ListenerDispatcher>,
    pub events: RecordingListener,
}

#[allow(dead_code)]
pub fn cluster() -> Cluster {
    let dispatcher = Arc::new(ListenerDispatcher::new());
    let events = RecordingListener::attach(&dispatcher);
    Cluster {
        store: Arc::new(MemoryStore::new()),
        clock: Arc::new(FixedClock::new(epoch())),
        dispatcher,
        events,
    }
}

#[allow(dead_code)]
pub fn acquisition_config(max_jobs: usize, default_wait_ms: u64) -> AsyncExecutorConfig {
    AsyncExecutorConfig {
        max_timer_jobs_per_acquisition: max_jobs,
        default_timer_job_acquire_wait_ms: default_wait_ms,
        ..AsyncExecutorConfig::default()
    }
}

impl Cluster {
    #[allow(dead_code)]
    pub fn node(&self, owner: &str, config: &AsyncExecutorConfig) -> Node {
        self.node_with(owner, config, |builder| builder)
    }

    /// Like [`node`](Self::node), with a hook to adjust the executor builder
    #[allow(dead_code)]
    pub fn node_with<F>(&self, owner: &str, config: &AsyncExecutorConfig, customize: F) -> Node
    where
        F: FnOnce(CommandExecutorBuilder) -> CommandExecutorBuilder,
    {
        let builder = CommandExecutor::builder(self.store.clone())
            .clock(self.clock.clone())
            .events(self.dispatcher.clone());
        let executor = customize(builder).build();
        let acquisition = Arc::new(TimerAcquisitionLoop::new(
            executor.clone(),
            JobManager::new(LockOwner::named(owner)),
            config,
        ));
        Node {
            executor,
            acquisition,
        }
    }

    /// Insert a timer job directly through a store transaction
    #[allow(dead_code)]
    pub fn seed_timer(&self, id: &str, due_in_secs: i64) {
        let mut timer = TimerJobEntity::new(
            epoch() + Duration::seconds(due_in_secs),
            JobPayload::new("trigger-timer"),
            epoch(),
        );
        timer.header_mut().assign_id(id).unwrap();
        let mut tx = self.store.begin().unwrap();
        tx.insert(&timer).unwrap();
        tx.commit().unwrap();
        self.store.clear_statements();
    }
}

/// Runs a hook after one named command body, still inside its context, so
/// the hook's effects land before that context flushes
#[allow(dead_code)]
pub struct AfterCommand {
    command: &'static str,
    hook: Mutex<Option<Box<dyn FnOnce() -> Result<()> + Send>>>,
}

impl AfterCommand {
    #[allow(dead_code)]
    pub fn new(command: &'static str) -> Arc<Self> {
        Arc::new(Self {
            command,
            hook: Mutex::new(None),
        })
    }

    /// Arm the hook for the next matching command only
    #[allow(dead_code)]
    pub fn arm(&self, hook: impl FnOnce() -> Result<()> + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }
}

impl CommandInterceptor for AfterCommand {
    fn name(&self) -> &'static str {
        "after_command"
    }

    fn execute(
        &self,
        config: CommandConfig,
        invocation: &mut Invocation<'_>,
        next: Next<'_>,
    ) -> Result<()> {
        next.run(config, invocation)?;
        if invocation.command_name() != self.command {
            return Ok(());
        }
        let hook = self.hook.lock().unwrap().take();
        match hook {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }
}

/// Error a failing hook reports
#[allow(dead_code)]
pub fn broken(message: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence).with_message(message.to_string())
}
