//! Command Context Tests
//!
//! Context stacking and reuse, failure recording and close semantics of the
//! command pipeline.
//!
//! ## Scenarios Covered
//!
//! 1. Nested reuse-eligible commands share one context and one flush
//! 2. A failing reused command surfaces through the owning frame
//! 3. The first recorded failure wins
//! 4. A context holding a failure is not reused by later nested commands
//! 5. `transaction_requires_new` isolates a nested command
//! 6. Close listeners run in order on success and on failure

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::{Arc, Mutex};

use flowx_core::errors::{ExErrorKind, FlowXError};
use flowx_core::model::{JobEntity, JobPayload};
use flowx_core::store::{DataStore, StatementOp};
use flowx_core::{command_fn, Command, CommandConfig, CommandContext, CommandContextCloseListener};

use common::harness;

type Seen = Arc<Mutex<Vec<(String, usize)>>>;

/// Inserts one job per level and records (context id, cache size)
struct Nest {
    depth: usize,
    seen: Seen,
}

impl Command for Nest {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> flowx_core::Result<()> {
        let now = ctx.now();
        ctx.insert(JobEntity::new(JobPayload::new("nest"), now))?;
        self.seen
            .lock()
            .unwrap()
            .push((ctx.id().to_string(), ctx.cache().len()));
        if self.depth > 1 {
            ctx.execute(&Nest {
                depth: self.depth - 1,
                seen: self.seen.clone(),
            })?;
        }
        Ok(())
    }
}

fn failing(message: &'static str) -> impl Command<Output = ()> {
    command_fn("failing", move |_ctx| {
        Err(FlowXError::CommandFailed {
            command: "failing".to_string(),
            message: message.to_string(),
        }
        .into())
    })
}

#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }
}

impl CommandContextCloseListener for CallLog {
    fn closing(&mut self, _ctx: &mut CommandContext) {
        self.push("closing");
    }

    fn after_flush(&mut self, _ctx: &CommandContext) {
        self.push("after_flush");
    }

    fn closed(&mut self, _ctx: &CommandContext) {
        self.push("closed");
    }

    fn close_failure(&mut self, _ctx: &CommandContext) {
        self.push("close_failure");
    }
}

#[test]
fn test_nested_commands_share_one_context() {
    // GIVEN a command nesting itself four levels deep
    let h = harness();
    let seen: Seen = Arc::default();
    let calls = CallLog::default();
    let listener = calls.clone();

    // WHEN it runs through the executor
    h.executor
        .execute(&command_fn("outer", move |ctx| {
            ctx.add_close_listener(listener.clone());
            ctx.execute(&Nest {
                depth: 4,
                seen: seen.clone(),
            })?;
            let seen = seen.lock().unwrap();

            // THEN every level ran in the same context and saw the entities
            // of the levels above it
            assert!(seen.iter().all(|(id, _)| id == &ctx.id().to_string()));
            let sizes: Vec<usize> = seen.iter().map(|(_, size)| *size).collect();
            assert_eq!(sizes, vec![1, 2, 3, 4]);
            assert!(ctx.is_reused());
            Ok(())
        }))
        .unwrap();

    // AND the context was closed and flushed exactly once
    assert_eq!(calls.calls(), vec!["closing", "after_flush", "closed"]);
    let statements = h.store.statements();
    assert_eq!(statements.len(), 4);
    assert!(statements.iter().all(|s| s.op == StatementOp::Insert));
}

#[test]
fn test_reused_failure_surfaces_through_owner() {
    let h = harness();

    let err = h
        .executor
        .execute(&command_fn("owner", |ctx| {
            let now = ctx.now();
            ctx.insert(JobEntity::new(JobPayload::new("owner"), now))?;

            // the nested failure is recorded, not returned
            let output = ctx.execute(&failing("inner broke"))?;
            assert!(output.is_none());
            assert_eq!(ctx.error().unwrap().kind(), ExErrorKind::CommandFailed);
            Ok(())
        }))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::CommandFailed);
    assert_eq!(err.message(), "inner broke");
    // owning frame rolled back
    assert!(h.store.statements().is_empty());
    assert!(h.store.list_jobs().unwrap().is_empty());
}

#[test]
fn test_first_recorded_failure_wins() {
    let h = harness();

    let err = h
        .executor
        .execute(&command_fn("owner", |ctx| {
            ctx.execute(&failing("first"))?;
            // the owner fails too, with a different error
            Err::<(), _>(
                FlowXError::Internal {
                    message: "second".to_string(),
                }
                .into(),
            )
        }))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::CommandFailed);
    assert_eq!(err.message(), "first");
}

#[test]
fn test_context_with_failure_is_not_reused() {
    let h = harness();
    let ids: Arc<Mutex<Vec<String>>> = Arc::default();
    let recorded = ids.clone();

    let result = h.executor.execute(&command_fn("owner", move |ctx| {
        recorded.lock().unwrap().push(ctx.id().to_string());
        ctx.execute(&failing("boom"))?;

        // a later nested command gets a context of its own
        let recorded = recorded.clone();
        ctx.execute(&command_fn("compensate", move |inner| {
            recorded.lock().unwrap().push(inner.id().to_string());
            let now = inner.now();
            inner.insert(JobEntity::new(JobPayload::new("compensate"), now))?;
            Ok(())
        }))?;
        Ok(())
    }));

    assert!(result.is_err());
    let ids = ids.lock().unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    // the compensating work committed on its own even though the owner failed
    let jobs = h.store.list_jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload.handler_type, "compensate");
}

#[test]
fn test_requires_new_runs_in_isolated_context() {
    let h = harness();

    h.executor
        .execute(&command_fn("owner", |ctx| {
            let owner_id = ctx.id().to_string();
            let nested = command_fn("isolated", move |inner| Ok(inner.id().to_string()));
            let inner_id = ctx
                .execute_with(CommandConfig::default().transaction_requires_new(), &nested)?
                .unwrap();
            assert_ne!(inner_id, owner_id);

            // a failure in an isolated context is returned, not recorded here
            let err = ctx
                .execute_with(
                    CommandConfig::default().transaction_requires_new(),
                    &failing("isolated"),
                )
                .unwrap_err();
            assert_eq!(err.message(), "isolated");
            assert!(ctx.error().is_none());
            Ok(())
        }))
        .unwrap();
}

#[test]
fn test_close_listeners_on_failure() {
    let h = harness();
    let calls = CallLog::default();
    let listener = calls.clone();

    let result = h.executor.execute(&command_fn("owner", move |ctx| {
        ctx.add_close_listener(listener.clone());
        ctx.execute(&failing("nope"))?;
        Ok(())
    }));

    assert!(result.is_err());
    assert_eq!(calls.calls(), vec!["closing", "close_failure"]);
}

#[test]
fn test_missing_entity_is_not_found() {
    let h = harness();

    let err = h
        .executor
        .execute(&command_fn("lookup", |ctx| {
            ctx.require::<JobEntity>("missing")?;
            Ok(())
        }))
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(err.entity_id(), Some("missing"));
}
