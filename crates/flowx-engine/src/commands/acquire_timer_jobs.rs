//! Claim due timer jobs for one acquirer

use chrono::Duration;
use flowx_core::model::TimerJobEntity;
use flowx_core::errors::{ExError, ExErrorKind};
use flowx_core::{Command, CommandContext, Entity, Result};
use flowx_core_types::LockOwner;
use tracing::debug;

/// Timers claimed by one acquisition cycle
#[derive(Debug, Clone, Default)]
pub struct AcquiredTimerJobs {
    pub jobs: Vec<TimerJobEntity>,
}

impl AcquiredTimerJobs {
    pub fn size(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.id()).collect()
    }
}

/// Query at most `max_jobs` due, unclaimed timers and stamp our claim on each
///
/// The claim is written by the context flush with a revision compare-and-set,
/// so when two acquirers race for the same timer exactly one command commits
/// and the other fails with `OptimisticLock`.
#[derive(Debug, Clone)]
pub struct AcquireTimerJobsCmd {
    max_jobs: usize,
    lock_owner: LockOwner,
    lock_time: Duration,
}

impl AcquireTimerJobsCmd {
    pub fn new(max_jobs: usize, lock_owner: LockOwner, lock_time: Duration) -> Self {
        Self {
            max_jobs,
            lock_owner,
            lock_time,
        }
    }
}

impl Command for AcquireTimerJobsCmd {
    type Output = AcquiredTimerJobs;

    fn name(&self) -> &str {
        "acquire_timer_jobs"
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<AcquiredTimerJobs> {
        let now = ctx.now();
        let lock_until = now.checked_add_signed(self.lock_time).ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("acquire_timer_jobs")
                .with_message(format!(
                    "lock time of {} ms overflows the claim expiration",
                    self.lock_time.num_milliseconds()
                ))
        })?;
        let due = ctx.store().find_due_timer_jobs(now, self.max_jobs)?;

        let mut acquired = AcquiredTimerJobs::default();
        for candidate in due {
            let timer = ctx.track_loaded(candidate);
            // an instance this context already holds may carry a newer claim
            if !timer.is_acquirable_at(now) {
                continue;
            }
            timer.lock(self.lock_owner.as_str(), lock_until);
            acquired.jobs.push(timer.clone());
        }

        debug!(
            lock_owner = %self.lock_owner,
            acquired = acquired.size(),
            "timer jobs claimed"
        );
        Ok(acquired)
    }
}
