//! Acquisition command
//!
//! Usage: flowx acquire [--once | --duration-secs <N>]

use std::thread;
use std::time::Duration;

use clap::Args;
use flowx_engine::{ProcessEngine, TimerAcquisitionLoop};

use super::EngineArgs;

#[derive(Debug, Args)]
pub struct AcquireArgs {
    /// Run a single acquisition cycle and exit
    #[arg(long, conflicts_with = "duration_secs")]
    pub once: bool,

    /// Run the acquisition thread for this long
    #[arg(long, default_value_t = 10)]
    pub duration_secs: u64,

    /// Lock owner written into claimed timers
    #[arg(long)]
    pub lock_owner: Option<String>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Execute acquire command
pub fn execute(args: AcquireArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = args.engine.load_config()?;
    if let Some(owner) = args.lock_owner {
        config.async_executor.lock_owner = Some(owner);
    }
    let engine = ProcessEngine::builder(config).build()?;
    let jobs_before = engine.store().list_jobs()?.len();

    if args.once {
        let acquisition = TimerAcquisitionLoop::new(
            engine.executor().clone(),
            engine.job_manager().clone(),
            &engine.config().async_executor,
        );
        let next_wait = acquisition.run_cycle();
        println!("Next cycle in {} ms", next_wait);
    } else {
        engine.async_executor().start()?;
        thread::sleep(Duration::from_secs(args.duration_secs));
        engine.close();
    }

    let promoted = engine
        .store()
        .list_jobs()?
        .len()
        .saturating_sub(jobs_before);
    println!(
        "Promoted {} timer job(s) as {}",
        promoted,
        engine.job_manager().lock_owner()
    );
    Ok(())
}
