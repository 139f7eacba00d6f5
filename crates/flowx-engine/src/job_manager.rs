//! Job manager - moves jobs between their persisted forms
//!
//! All operations work inside the caller's command context, so the records
//! they retire and create are flushed or rolled back together with the rest
//! of that unit of work.

use chrono::{DateTime, Utc};
use flowx_core::events::{FlowEvent, FlowEventType};
use flowx_core::model::{JobEntity, JobPayload, TimerJobEntity};
use flowx_core::{CommandContext, Entity, EntityKind, FlowXError, Result};
use flowx_core_types::LockOwner;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JobManager {
    lock_owner: LockOwner,
}

impl JobManager {
    pub fn new(lock_owner: LockOwner) -> Self {
        Self { lock_owner }
    }

    /// Claim marker this manager's acquirer writes into timers
    pub fn lock_owner(&self) -> &LockOwner {
        &self.lock_owner
    }

    /// Schedule a timer job due at `due_date`
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when the payload's timer id is already tracked.
    pub fn create_timer_job(
        &self,
        ctx: &mut CommandContext,
        due_date: DateTime<Utc>,
        payload: JobPayload,
    ) -> Result<TimerJobEntity> {
        let now = ctx.now();
        let timer = ctx.insert(TimerJobEntity::new(due_date, payload, now))?;
        debug!(timer_id = timer.id(), due_date = %due_date, "timer job scheduled");
        Ok(timer.clone())
    }

    /// Retire `timer` and create its executable job in the same unit of work
    ///
    /// The timer is re-read through the context so the delete carries the
    /// revision the acquisition flush left behind.
    ///
    /// # Errors
    ///
    /// `NotFound` when the timer is gone, `OptimisticLock` when another
    /// acquirer holds its claim.
    pub fn move_timer_job_to_executable_job(
        &self,
        ctx: &mut CommandContext,
        timer: &TimerJobEntity,
    ) -> Result<JobEntity> {
        let current = ctx.require::<TimerJobEntity>(timer.id())?;
        if let Some(owner) = current.lock_owner.as_deref() {
            if owner != self.lock_owner.as_str() {
                return Err(FlowXError::LockedByOther {
                    job_id: current.id().to_string(),
                    owner: Some(owner.to_string()),
                }
                .into());
            }
        }
        current.header_mut().set_deleted(true);
        let retired = current.clone();

        let now = ctx.now();
        let job = ctx.insert(JobEntity::from_timer_job(&retired, now))?.clone();
        ctx.dispatch(FlowEvent::entity(
            FlowEventType::TimerFired,
            EntityKind::TimerJob,
            retired.id(),
        ));
        debug!(timer_id = retired.id(), job_id = job.id(), "timer job moved to executable job");

        Ok(job)
    }
}
