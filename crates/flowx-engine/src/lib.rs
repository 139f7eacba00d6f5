//! FlowX Engine - job orchestration on top of the command pipeline
//!
//! Provides:
//! - `JobManager` for timer-to-executable job promotion
//! - Engine commands (timer acquisition, promotion, scheduling, deploy)
//! - `TimerAcquisitionLoop` and the `AsyncExecutor` thread that drives it
//! - `ProcessEngine`, wiring store, executor and acquisition from config

pub mod acquisition;
pub mod async_executor;
pub mod commands;
pub mod config;
pub mod job_manager;
pub mod process_engine;

pub use acquisition::TimerAcquisitionLoop;
pub use async_executor::AsyncExecutor;
pub use config::{AsyncExecutorConfig, EngineConfig, StoreConfig};
pub use job_manager::JobManager;
pub use process_engine::ProcessEngine;
