//! Property: whatever mix of new, mutated and deleted entities a context
//! accumulates, the flush writes all inserts, then all updates, then all
//! deletes, each in registration order, and never writes an entity that was
//! inserted and deleted in the same context.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::Duration;
use flowx_core::model::{JobPayload, TimerJobEntity};
use flowx_core::store::{Statement, StatementOp};
use flowx_core::{command_fn, Entity, EntityKind};
use proptest::prelude::*;

use common::{epoch, harness, seed_timer};

#[derive(Debug, Clone, Copy)]
enum Action {
    Untouched,
    Mutate,
    Delete,
    MutateThenDelete,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Untouched),
        Just(Action::Mutate),
        Just(Action::Delete),
        Just(Action::MutateThenDelete),
    ]
}

fn expected_statements(plan: &[(bool, Action)]) -> Vec<Statement> {
    let id = |i: usize, is_new: bool| {
        if is_new {
            format!("new-{}", i)
        } else {
            format!("old-{}", i)
        }
    };
    let stmt = |op, i, is_new| Statement {
        op,
        kind: EntityKind::TimerJob,
        id: id(i, is_new),
    };

    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    let mut deletes = Vec::new();
    for (i, (is_new, action)) in plan.iter().copied().enumerate() {
        match (is_new, action) {
            (true, Action::Untouched | Action::Mutate) => {
                inserts.push(stmt(StatementOp::Insert, i, true))
            }
            (true, _) => {}
            (false, Action::Untouched) => {}
            (false, Action::Mutate) => updates.push(stmt(StatementOp::Update, i, false)),
            (false, _) => deletes.push(stmt(StatementOp::Delete, i, false)),
        }
    }
    inserts.into_iter().chain(updates).chain(deletes).collect()
}

proptest! {
    #[test]
    fn flush_respects_phase_and_registration_order(
        plan in prop::collection::vec((any::<bool>(), arb_action()), 1..12)
    ) {
        let h = harness();
        for (i, (is_new, _)) in plan.iter().enumerate() {
            if !is_new {
                seed_timer(&h.store, &format!("old-{}", i), i as i64);
            }
        }

        let steps = plan.clone();
        h.executor
            .execute(&command_fn("mixed_unit_of_work", move |ctx| {
                for (i, (is_new, action)) in steps.iter().copied().enumerate() {
                    let timer = if is_new {
                        let mut fresh = TimerJobEntity::new(
                            epoch() + Duration::seconds(i as i64),
                            JobPayload::new("generated"),
                            epoch(),
                        );
                        fresh.header_mut().assign_id(format!("new-{}", i))?;
                        ctx.insert(fresh)?
                    } else {
                        ctx.require::<TimerJobEntity>(&format!("old-{}", i))?
                    };
                    if matches!(action, Action::Mutate | Action::MutateThenDelete) {
                        timer.payload.retries += 1;
                    }
                    if matches!(action, Action::Delete | Action::MutateThenDelete) {
                        timer.header_mut().set_deleted(true);
                    }
                }
                Ok(())
            }))
            .unwrap();

        prop_assert_eq!(h.store.statements(), expected_statements(&plan));
    }
}
