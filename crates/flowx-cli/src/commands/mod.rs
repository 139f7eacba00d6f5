//! Subcommand implementations

pub mod acquire;
pub mod job;
pub mod timer;

use std::path::PathBuf;

use clap::Args;
use flowx_engine::{EngineConfig, ProcessEngine};

const DEFAULT_DB_PATH: &str = ".flowx/flowx.db";

/// Where the engine's settings and database come from
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// SQLite database path (overrides the config file)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl EngineArgs {
    pub fn load_config(&self) -> Result<EngineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_path(path)?,
            None => EngineConfig::default(),
        };

        if let Some(db) = &self.db {
            config.store.database_path = Some(db.clone());
        }
        if config.store.database_path.is_none() {
            config.store.database_path = Some(PathBuf::from(DEFAULT_DB_PATH));
        }
        if let Some(parent) = config
            .store
            .database_path
            .as_ref()
            .and_then(|path| path.parent())
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }

        // acquisition only runs when a subcommand asks for it
        config.async_executor.auto_activate = false;
        Ok(config)
    }

    pub fn open_engine(&self) -> Result<ProcessEngine, Box<dyn std::error::Error>> {
        Ok(ProcessEngine::builder(self.load_config()?).build()?)
    }
}
