//! Inactivity auto-lock.
//!
//! One pending timer at a time. Every reschedule bumps a generation counter
//! and aborts the previous task; a task that wakes up anyway checks the
//! generation under the timer mutex before locking, and the repository
//! additionally refuses if a lock or unlock happened since scheduling.
//!
//! Lock order is timer mutex, then repository state. Nothing here takes
//! them the other way round.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::VaultError;
use crate::repository::VaultRepository;

#[derive(Debug, Default)]
struct TimerState {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Cancellable "lock after N ms of inactivity" timer for a repository.
#[derive(Debug)]
pub struct AutoLock {
    repo: Arc<VaultRepository>,
    runtime: Handle,
    background_ms: u64,
    timer: Arc<Mutex<TimerState>>,
}

impl AutoLock {
    /// Bind to `repo`, spawning timers on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] when called outside a tokio runtime.
    pub fn new(repo: Arc<VaultRepository>) -> Result<Self, VaultError> {
        let runtime = Handle::try_current()
            .map_err(|e| VaultError::Config(format!("auto-lock needs a tokio runtime: {e}")))?;
        let background_ms = repo.config().background_lock_ms;
        Ok(Self {
            repo,
            runtime,
            background_ms,
            timer: Arc::new(Mutex::new(TimerState::default())),
        })
    }

    /// Restart the inactivity timer with the vault's timeout.
    /// A timeout of 0 only cancels.
    pub fn record_activity(&self) {
        let ms = self.repo.auto_lock_ms().unwrap_or(0);
        self.schedule(ms);
    }

    /// Replace the pending timer with the shorter background timeout.
    /// Does nothing beyond cancelling when auto-lock is off.
    pub fn enter_background(&self) {
        let foreground = self.repo.auto_lock_ms().unwrap_or(0);
        let ms = if foreground == 0 {
            0
        } else {
            foreground.min(self.background_ms)
        };
        self.schedule(ms);
    }

    /// Back to the regular inactivity timeout.
    pub fn enter_foreground(&self) {
        self.record_activity();
    }

    /// Drop the pending timer, if any.
    pub fn cancel(&self) {
        self.schedule(0);
    }

    fn lock_timer(&self) -> MutexGuard<'_, TimerState> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self, ms: u64) {
        let mut timer = self.lock_timer();
        timer.generation = timer.generation.wrapping_add(1);
        if let Some(task) = timer.task.take() {
            task.abort();
        }
        if ms == 0 || !self.repo.is_unlocked() {
            return;
        }

        let generation = timer.generation;
        let epoch = self.repo.session_epoch();
        let repo = Arc::clone(&self.repo);
        let state = Arc::clone(&self.timer);
        timer.task = Some(self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let current = state.lock().unwrap_or_else(PoisonError::into_inner);
            if current.generation == generation && repo.lock_if_epoch(epoch) {
                tracing::info!(after_ms = ms, "vault auto-locked");
            }
        }));
        tracing::debug!(after_ms = ms, "auto-lock scheduled");
    }
}

impl Drop for AutoLock {
    fn drop(&mut self) {
        if let Some(task) = self.lock_timer().task.take() {
            task.abort();
        }
    }
}
