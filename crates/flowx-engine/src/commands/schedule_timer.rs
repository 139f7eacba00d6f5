//! Schedule a new timer job

use chrono::{DateTime, Utc};
use flowx_core::model::{JobPayload, TimerJobEntity};
use flowx_core::{Command, CommandContext, Result};

use crate::job_manager::JobManager;

#[derive(Debug, Clone)]
pub struct ScheduleTimerJobCmd<'a> {
    job_manager: &'a JobManager,
    due_date: DateTime<Utc>,
    payload: JobPayload,
}

impl<'a> ScheduleTimerJobCmd<'a> {
    pub fn new(job_manager: &'a JobManager, due_date: DateTime<Utc>, payload: JobPayload) -> Self {
        Self {
            job_manager,
            due_date,
            payload,
        }
    }
}

impl Command for ScheduleTimerJobCmd<'_> {
    type Output = TimerJobEntity;

    fn name(&self) -> &str {
        "schedule_timer_job"
    }

    fn execute(&self, ctx: &mut CommandContext) -> Result<TimerJobEntity> {
        self.job_manager
            .create_timer_job(ctx, self.due_date, self.payload.clone())
    }
}
