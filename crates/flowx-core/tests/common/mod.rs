use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flowx_core::clock::FixedClock;
use flowx_core::events::{ListenerDispatcher, RecordingListener};
use flowx_core::model::{JobPayload, TimerJobEntity};
use flowx_core::store::{DataStore, MemoryStore};
use flowx_core::{CommandExecutor, CommandExecutorBuilder, Entity};

/// Executor wired to an in-memory store, a pinned clock and a recording
/// event listener
#[allow(dead_code)]
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub events: RecordingListener,
    pub executor: CommandExecutor,
}

/// Fixed "now" used across tests
#[allow(dead_code)]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(|builder| builder)
}

/// Like [`harness`], with a hook to adjust the executor builder
#[allow(dead_code)]
pub fn harness_with<F>(customize: F) -> Harness
where
    F: FnOnce(CommandExecutorBuilder) -> CommandExecutorBuilder,
{
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(epoch()));
    let dispatcher = Arc::new(ListenerDispatcher::new());
    let events = RecordingListener::attach(&dispatcher);
    let builder = CommandExecutor::builder(store.clone())
        .clock(clock.clone())
        .events(dispatcher);
    Harness {
        store,
        clock,
        events,
        executor: customize(builder).build(),
    }
}

/// Insert a timer job directly through a store transaction
#[allow(dead_code)]
pub fn seed_timer(store: &MemoryStore, id: &str, due_in_secs: i64) {
    let mut timer = TimerJobEntity::new(
        epoch() + Duration::seconds(due_in_secs),
        JobPayload::new("trigger-timer"),
        epoch(),
    );
    timer.header_mut().assign_id(id).unwrap();
    let mut tx = store.begin().unwrap();
    tx.insert(&timer).unwrap();
    tx.commit().unwrap();
    store.clear_statements();
}
