//! Entity Flush Tests
//!
//! What a context writes back when it closes.
//!
//! ## Scenarios Covered
//!
//! 1. Inserts are written before updates that reference them
//! 2. Insert followed by delete writes nothing
//! 3. Untouched entities produce no update, mutated ones exactly one
//! 4. A lost compare-and-set fails the command and rolls back the flush
//! 5. Created/deleted notifications follow a successful flush
//! 6. An entity overwritten under a different id fails the flush

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::Duration;
use flowx_core::errors::ExErrorKind;
use flowx_core::events::FlowEventType;
use flowx_core::model::{JobEntity, JobPayload, TimerJobEntity};
use flowx_core::store::{DataStore, Statement, StatementOp};
use flowx_core::{command_fn, Entity, EntityKind};

use common::{epoch, harness, seed_timer};

fn statement(op: StatementOp, kind: EntityKind, id: &str) -> Statement {
    Statement {
        op,
        kind,
        id: id.to_string(),
    }
}

#[test]
fn test_insert_is_flushed_before_referencing_update() {
    // GIVEN a stored timer job B
    let h = harness();
    seed_timer(&h.store, "timer-b", 0);

    // WHEN one command updates B to reference a job A it creates afterwards
    h.executor
        .execute(&command_fn("link", |ctx| {
            ctx.require::<TimerJobEntity>("timer-b")?;
            let now = ctx.now();
            let mut job = JobEntity::new(JobPayload::new("created"), now);
            job.header_mut().assign_id("job-a")?;
            ctx.insert(job)?;
            let timer = ctx.require::<TimerJobEntity>("timer-b")?;
            timer.payload.handler_configuration = Some("job-a".to_string());
            Ok(())
        }))
        .unwrap();

    // THEN the insert of A precedes the update of B
    assert_eq!(
        h.store.statements(),
        vec![
            statement(StatementOp::Insert, EntityKind::Job, "job-a"),
            statement(StatementOp::Update, EntityKind::TimerJob, "timer-b"),
        ]
    );
}

#[test]
fn test_insert_then_delete_writes_nothing() {
    let h = harness();

    h.executor
        .execute(&command_fn("transient", |ctx| {
            let now = ctx.now();
            let job = ctx.insert(JobEntity::new(JobPayload::new("short-lived"), now))?;
            job.header_mut().set_deleted(true);
            Ok(())
        }))
        .unwrap();

    assert!(h.store.statements().is_empty());
    assert!(h.store.list_jobs().unwrap().is_empty());
}

#[test]
fn test_read_only_access_produces_no_update() {
    let h = harness();
    seed_timer(&h.store, "t1", 0);

    let due = h
        .executor
        .execute(&command_fn("read", |ctx| {
            Ok(ctx.require::<TimerJobEntity>("t1")?.due_date)
        }))
        .unwrap();

    assert_eq!(due, epoch());
    assert!(h.store.statements().is_empty());
}

#[test]
fn test_mutation_produces_exactly_one_update() {
    let h = harness();
    seed_timer(&h.store, "t1", 0);

    h.executor
        .execute(&command_fn("touch", |ctx| {
            ctx.require::<TimerJobEntity>("t1")?.payload.retries = 1;
            // a second lookup hits the cache, not the store
            ctx.require::<TimerJobEntity>("t1")?.payload.retries = 0;
            Ok(())
        }))
        .unwrap();

    assert_eq!(
        h.store.statements(),
        vec![statement(StatementOp::Update, EntityKind::TimerJob, "t1")]
    );
    let stored = h.store.find_timer_job("t1").unwrap().unwrap();
    assert_eq!(stored.payload.retries, 0);
    assert_eq!(stored.revision(), 2);
}

#[test]
fn test_lost_compare_and_set_rolls_back_flush() {
    let h = harness();
    seed_timer(&h.store, "t1", 0);
    let executor = h.executor.clone();

    let err = h
        .executor
        .execute(&command_fn("slow_claim", move |ctx| {
            let now = ctx.now();
            ctx.require::<TimerJobEntity>("t1")?
                .lock("slow", now + Duration::minutes(5));
            ctx.insert(JobEntity::new(JobPayload::new("side-effect"), now))?;

            // a concurrent unit of work claims the same timer first
            executor.execute(&command_fn("fast_claim", |other| {
                let now = other.now();
                other
                    .require::<TimerJobEntity>("t1")?
                    .lock("fast", now + Duration::minutes(5));
                Ok(())
            }))?;
            Ok(())
        }))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::OptimisticLock);
    assert!(err.is_optimistic_lock());

    let stored = h.store.find_timer_job("t1").unwrap().unwrap();
    assert_eq!(stored.lock_owner.as_deref(), Some("fast"));
    // the insert from the losing context was rolled back with it
    assert!(h.store.list_jobs().unwrap().is_empty());
}

#[test]
fn test_flush_dispatches_created_and_deleted() {
    let h = harness();
    seed_timer(&h.store, "t1", 0);

    h.executor
        .execute(&command_fn("swap", |ctx| {
            ctx.delete::<TimerJobEntity>("t1")?;
            let now = ctx.now();
            let mut job = JobEntity::new(JobPayload::new("swapped"), now);
            job.header_mut().assign_id("j1")?;
            ctx.insert(job)?;
            Ok(())
        }))
        .unwrap();

    let created = h.events.of_type(FlowEventType::EntityCreated);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].entity_id.as_deref(), Some("j1"));

    let deleted = h.events.of_type(FlowEventType::EntityDeleted);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].entity_kind, Some(EntityKind::TimerJob));
}

#[test]
fn test_failed_command_dispatches_nothing() {
    let h = harness();

    let result = h.executor.execute(&command_fn("doomed", |ctx| {
        let now = ctx.now();
        ctx.insert(JobEntity::new(JobPayload::new("doomed"), now))?;
        ctx.require::<TimerJobEntity>("missing")?;
        Ok(())
    }));

    assert!(result.is_err());
    assert!(h.events.events().is_empty());
}

#[test]
fn test_overwritten_entity_cannot_change_tracked_id() {
    // GIVEN two stored timers
    let h = harness();
    seed_timer(&h.store, "t1", 0);
    seed_timer(&h.store, "t2", 10);

    // WHEN a command replaces the cached t1 wholesale with a copy of t2
    let err = h
        .executor
        .execute(&command_fn("rekey", |ctx| {
            let mut other = ctx.require::<TimerJobEntity>("t2")?.clone();
            other.payload.retries = 7;
            *ctx.require::<TimerJobEntity>("t1")? = other;
            Ok(())
        }))
        .unwrap_err();

    // THEN the flush refuses it and neither row changed
    assert_eq!(err.kind(), ExErrorKind::IdReassigned);
    assert_eq!(err.entity_id(), Some("t1"));
    assert!(h.store.statements().is_empty());
    assert_eq!(h.store.find_timer_job("t1").unwrap().unwrap().revision(), 1);
    assert_eq!(h.store.find_timer_job("t2").unwrap().unwrap().payload.retries, 3);
}
