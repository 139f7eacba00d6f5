//! Executable job commands
//!
//! Usage: flowx job list

use clap::{Args, Subcommand};
use flowx_core::Entity;

use super::EngineArgs;

#[derive(Debug, Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// List executable jobs
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Execute job command
pub fn execute(args: JobArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        JobCommand::List(list_args) => execute_list(list_args),
    }
}

fn execute_list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = args.engine.open_engine()?;
    let jobs = engine.store().list_jobs()?;
    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    for job in jobs {
        println!(
            "{}\t{}\t{}\tretries={}",
            job.id(),
            job.payload.handler_type,
            job.lock_owner.as_deref().unwrap_or("-"),
            job.payload.retries
        );
    }
    Ok(())
}
