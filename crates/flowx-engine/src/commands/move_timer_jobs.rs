//! Promote claimed timers to executable jobs

use flowx_core::model::{JobEntity, TimerJobEntity};
use flowx_core::{Command, CommandContext, Result};

use crate::job_manager::JobManager;

/// Move every timer of one acquisition batch through the job manager
///
/// Runs as a command of its own after the claim has committed, so a failed
/// promotion rolls back the promotion batch but leaves the claims in place;
/// claimed timers become acquirable again once their lock expires.
#[derive(Debug, Clone)]
pub struct MoveTimerJobsToExecutableCmd<'a> {
    job_manager: &'a JobManager,
    timers: &'a [TimerJobEntity],
}

impl<'a> MoveTimerJobsToExecutableCmd<'a> {
    pub fn new(job_manager: &'a JobManager, timers: &'a [TimerJobEntity]) -> Self {
        Self {
            job_manager,
            timers,
        }
    }
}

impl Command for MoveTimerJobsToExecutableCmd<'_> {
    type Output = Vec<JobEntity>;

    fn name(&self) -> &str {
        "move_timer_jobs_to_executable"
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<Vec<JobEntity>> {
        self.timers
            .iter()
            .map(|timer| self.job_manager.move_timer_job_to_executable_job(ctx, timer))
            .collect()
    }
}
