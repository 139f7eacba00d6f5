//! Timer job commands
//!
//! Usage:
//!   flowx timer schedule --handler <TYPE> [--in-secs <N> | --at <RFC3339>]
//!   flowx timer list

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use flowx_core::model::JobPayload;
use flowx_core::Entity;

use super::EngineArgs;

#[derive(Debug, Args)]
pub struct TimerArgs {
    #[command(subcommand)]
    pub command: TimerCommand,
}

#[derive(Debug, Subcommand)]
pub enum TimerCommand {
    /// Schedule a timer job
    Schedule(ScheduleArgs),
    /// List scheduled timer jobs, earliest due first
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Handler type the resulting job is dispatched to
    #[arg(long)]
    pub handler: String,

    /// Handler configuration passed through to the job
    #[arg(long)]
    pub handler_config: Option<String>,

    /// Due this many seconds from now
    #[arg(long, conflicts_with = "at")]
    pub in_secs: Option<i64>,

    /// Due at this instant (RFC 3339)
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    #[arg(long)]
    pub tenant: Option<String>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Execute timer command
pub fn execute(args: TimerArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        TimerCommand::Schedule(schedule_args) => execute_schedule(schedule_args),
        TimerCommand::List(list_args) => execute_list(list_args),
    }
}

fn execute_schedule(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let due_date = match (args.at, args.in_secs) {
        (Some(at), _) => at,
        (None, Some(secs)) => Utc::now() + Duration::seconds(secs),
        (None, None) => Utc::now(),
    };

    let mut payload = JobPayload::new(args.handler);
    payload.handler_configuration = args.handler_config;
    payload.tenant_id = args.tenant;

    let engine = args.engine.open_engine()?;
    let timer = engine.schedule_timer(due_date, payload)?;
    println!("{} due {}", timer.id(), timer.due_date.to_rfc3339());
    Ok(())
}

fn execute_list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = args.engine.open_engine()?;
    let timers = engine.store().list_timer_jobs()?;
    if timers.is_empty() {
        println!("No timer jobs");
        return Ok(());
    }

    for timer in timers {
        let lock = match (&timer.lock_owner, timer.lock_expiration_time) {
            (Some(owner), Some(until)) => format!("locked by {} until {}", owner, until.to_rfc3339()),
            (Some(owner), None) => format!("locked by {}", owner),
            _ => "unlocked".to_string(),
        };
        println!(
            "{}\t{}\t{}\t{}",
            timer.id(),
            timer.due_date.to_rfc3339(),
            timer.payload.handler_type,
            lock
        );
    }
    Ok(())
}
