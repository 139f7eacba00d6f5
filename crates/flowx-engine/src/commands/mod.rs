//! Engine commands
//!
//! Each command runs through the core `CommandExecutor` and therefore inside
//! one command context: everything it inserts, changes or deletes is flushed
//! in a single store transaction or not at all.

pub mod acquire_timer_jobs;
pub mod deploy;
pub mod move_timer_jobs;
pub mod schedule_timer;

pub use acquire_timer_jobs::{AcquireTimerJobsCmd, AcquiredTimerJobs};
pub use deploy::{DefaultDeploymentComparator, DeployCmd, DeploymentComparator};
pub use move_timer_jobs::MoveTimerJobsToExecutableCmd;
pub use schedule_timer::ScheduleTimerJobCmd;
