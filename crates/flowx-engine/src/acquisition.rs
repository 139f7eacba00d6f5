//! Timer acquisition loop
//!
//! One loop per engine instance. Each cycle claims a batch of due timers in
//! one command and promotes them to executable jobs in a second one, then
//! waits: not at all when the batch came back full, the default wait
//! otherwise. Several instances may run against one store; the revision
//! compare-and-set on the claim decides who gets a contended timer, and the
//! loser just sees an optimistic-lock failure for that cycle.
//!
//! [`TimerAcquisitionLoop::stop`] may be called from any thread and wakes a
//! waiting loop at once; a cycle already in flight runs to completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use flowx_core::{log_op_end, log_op_error, log_op_start};
use flowx_core::{CommandExecutor, Result};
use tracing::{debug, info};

use crate::commands::{AcquireTimerJobsCmd, MoveTimerJobsToExecutableCmd};
use crate::config::AsyncExecutorConfig;
use crate::job_manager::JobManager;

#[derive(Debug, Default)]
struct LoopState {
    interrupted: bool,
    waiting: bool,
}

pub struct TimerAcquisitionLoop {
    executor: CommandExecutor,
    job_manager: JobManager,
    max_jobs_per_acquisition: usize,
    default_wait_ms: u64,
    lock_time: ChronoDuration,
    millis_to_wait: AtomicU64,
    state: Mutex<LoopState>,
    wake: Condvar,
}

impl TimerAcquisitionLoop {
    pub fn new(
        executor: CommandExecutor,
        job_manager: JobManager,
        config: &AsyncExecutorConfig,
    ) -> Self {
        Self {
            executor,
            job_manager,
            max_jobs_per_acquisition: config.max_timer_jobs_per_acquisition,
            default_wait_ms: config.default_timer_job_acquire_wait_ms,
            lock_time: config.timer_lock_time(),
            millis_to_wait: AtomicU64::new(0),
            state: Mutex::new(LoopState::default()),
            wake: Condvar::new(),
        }
    }

    pub fn job_manager(&self) -> &JobManager {
        &self.job_manager
    }

    /// Wait chosen by the last completed cycle
    pub fn millis_to_wait(&self) -> u64 {
        self.millis_to_wait.load(Ordering::SeqCst)
    }

    pub fn is_interrupted(&self) -> bool {
        self.state().interrupted
    }

    /// Whether the loop is blocked in its between-cycle wait
    pub fn is_waiting(&self) -> bool {
        self.state().waiting
    }

    /// Drive cycles until [`stop`](Self::stop) is called
    pub fn run(&self) {
        info!(
            lock_owner = %self.job_manager.lock_owner(),
            "timer job acquisition started"
        );

        while !self.is_interrupted() {
            let wait = self.run_cycle();
            if wait > 0 {
                self.wait(Duration::from_millis(wait));
            }
        }

        info!(
            lock_owner = %self.job_manager.lock_owner(),
            "timer job acquisition stopped"
        );
    }

    /// One acquire-and-promote cycle; returns the wait before the next one
    ///
    /// Failures never escape: a lost optimistic-lock race keeps the current
    /// wait, anything else falls back to the default wait.
    pub fn run_cycle(&self) -> u64 {
        log_op_start!("acquire_timer_jobs_cycle");
        let start = Instant::now();

        let wait = match self.acquire_and_promote() {
            Ok(acquired) => {
                log_op_end!(
                    "acquire_timer_jobs_cycle",
                    duration_ms = start.elapsed().as_millis() as u64,
                    acquired = acquired
                );
                if acquired >= self.max_jobs_per_acquisition {
                    0
                } else {
                    self.default_wait_ms
                }
            }
            Err(err) if err.is_optimistic_lock() => {
                log_op_error!(
                    "acquire_timer_jobs_cycle",
                    &err,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                debug!(
                    error = %err,
                    "optimistic locking conflict during timer job acquisition; \
                     expected when several acquirers share one store"
                );
                self.millis_to_wait()
            }
            Err(err) => {
                log_op_error!(
                    "acquire_timer_jobs_cycle",
                    &err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %err
                );
                self.default_wait_ms
            }
        };

        self.millis_to_wait.store(wait, Ordering::SeqCst);
        wait
    }

    /// Interrupt the loop; wakes a pending wait immediately
    pub fn stop(&self) {
        let mut state = self.state();
        state.interrupted = true;
        if state.waiting {
            state.waiting = false;
            self.wake.notify_all();
        }
    }

    fn acquire_and_promote(&self) -> Result<usize> {
        let acquired = self.executor.execute(&AcquireTimerJobsCmd::new(
            self.max_jobs_per_acquisition,
            self.job_manager.lock_owner().clone(),
            self.lock_time,
        ))?;

        if !acquired.is_empty() {
            self.executor.execute(&MoveTimerJobsToExecutableCmd::new(
                &self.job_manager,
                &acquired.jobs,
            ))?;
        }

        Ok(acquired.size())
    }

    fn wait(&self, timeout: Duration) {
        let mut state = self.state();
        if state.interrupted {
            return;
        }
        debug!(millis = timeout.as_millis() as u64, "timer job acquisition sleeping");
        state.waiting = true;
        let (mut state, _) = self
            .wake
            .wait_timeout_while(state, timeout, |s| !s.interrupted)
            .unwrap_or_else(PoisonError::into_inner);
        state.waiting = false;
        debug!("timer job acquisition woke up");
    }

    fn state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TimerAcquisitionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerAcquisitionLoop")
            .field("lock_owner", self.job_manager.lock_owner())
            .field("max_jobs_per_acquisition", &self.max_jobs_per_acquisition)
            .field("default_wait_ms", &self.default_wait_ms)
            .field("millis_to_wait", &self.millis_to_wait())
            .finish()
    }
}
