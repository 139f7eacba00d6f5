//! FlowX CLI
//!
//! Command-line interface for scheduling timers and running acquisition
//! against a FlowX database

use clap::{Parser, Subcommand};
use flowx_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "flowx")]
#[command(about = "FlowX - timer jobs and acquisition", long_about = None)]
struct Cli {
    /// Enable logging to stderr with this profile (dev, prod)
    #[arg(long, global = true)]
    log: Option<Profile>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Timer job operations
    Timer(commands::timer::TimerArgs),
    /// Executable job operations
    Job(commands::job::JobArgs),
    /// Acquire due timer jobs and promote them to executable jobs
    Acquire(commands::acquire::AcquireArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Some(profile) = cli.log {
        logging_facility::init(profile);
    }

    let result = match cli.command {
        Commands::Timer(args) => commands::timer::execute(args),
        Commands::Job(args) => commands::job::execute(args),
        Commands::Acquire(args) => commands::acquire::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
