//! Async executor - owns the timer acquisition thread

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use flowx_core::errors::{ExError, ExErrorKind};
use flowx_core::{CommandExecutor, Result};
use tracing::{info, warn};

use crate::acquisition::TimerAcquisitionLoop;
use crate::config::AsyncExecutorConfig;
use crate::job_manager::JobManager;

pub const ACQUISITION_THREAD_NAME: &str = "flowx-acquire-timer-jobs";

struct Running {
    acquisition: Arc<TimerAcquisitionLoop>,
    handle: JoinHandle<()>,
}

pub struct AsyncExecutor {
    executor: CommandExecutor,
    job_manager: JobManager,
    config: AsyncExecutorConfig,
    running: Mutex<Option<Running>>,
}

impl AsyncExecutor {
    pub fn new(
        executor: CommandExecutor,
        job_manager: JobManager,
        config: AsyncExecutorConfig,
    ) -> Self {
        Self {
            executor,
            job_manager,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AsyncExecutorConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.running().is_some()
    }

    /// Spawn the acquisition thread; a no-op when already running
    ///
    /// # Errors
    ///
    /// `Internal` when the thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running();
        if running.is_some() {
            return Ok(());
        }

        let acquisition = Arc::new(TimerAcquisitionLoop::new(
            self.executor.clone(),
            self.job_manager.clone(),
            &self.config,
        ));
        let worker = acquisition.clone();
        let handle = thread::Builder::new()
            .name(ACQUISITION_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                ExError::new(ExErrorKind::Internal)
                    .with_op("start_async_executor")
                    .with_message(e.to_string())
            })?;

        info!(lock_owner = %self.job_manager.lock_owner(), "async executor started");
        *running = Some(Running {
            acquisition,
            handle,
        });
        Ok(())
    }

    /// Stop the acquisition loop and wait for its thread to finish
    pub fn shutdown(&self) {
        let Some(Running {
            acquisition,
            handle,
        }) = self.running().take()
        else {
            return;
        };

        acquisition.stop();
        if handle.join().is_err() {
            warn!("timer acquisition thread panicked");
        }
        info!(lock_owner = %self.job_manager.lock_owner(), "async executor shut down");
    }

    fn running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AsyncExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AsyncExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncExecutor")
            .field("lock_owner", self.job_manager.lock_owner())
            .field("active", &self.is_active())
            .finish()
    }
}
