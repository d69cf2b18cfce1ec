//! Process-wide busy flag and stop signal.
//!
//! One `ProcessState` is shared by every run. Acquiring it hands out a
//! `RunTicket`; checkpoints poll the ticket rather than the global flag, so a
//! run that was told to stop keeps seeing the stop after the grace period has
//! already released the global state. Once a newer run has taken the state,
//! the old ticket reports itself superseded and its run must leave the board
//! and the monitor alone.

use crate::error::{EngineError, EngineResult};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Inner {
    is_running: bool,
    stop_requested: bool,
    started_at: Option<Instant>,
    generation: u64,
    cancel: Option<Arc<AtomicBool>>,
}

/// Handle held by the task or batch that owns the process state.
#[derive(Debug, Clone)]
pub struct RunTicket {
    generation: u64,
    cancel: Arc<AtomicBool>,
    latest: Arc<AtomicU64>,
}

impl RunTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// A stopped run whose state was force-released and then taken by a newer run.
    pub fn is_superseded(&self) -> bool {
        self.latest.load(Ordering::Relaxed) != self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct ProcessState {
    inner: Mutex<Inner>,
    /// Mirror of `Inner::generation`, readable by tickets without the lock.
    latest: Arc<AtomicU64>,
}

impl ProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned flag set is still a valid flag set.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the state for a new task or batch. Rejects if one is running.
    pub fn try_begin(&self) -> EngineResult<RunTicket> {
        let mut inner = self.lock();
        if inner.is_running {
            return Err(EngineError::AlreadyRunning);
        }
        inner.generation += 1;
        self.latest.store(inner.generation, Ordering::Relaxed);
        inner.is_running = true;
        inner.stop_requested = false;
        inner.started_at = Some(Instant::now());
        let cancel = Arc::new(AtomicBool::new(false));
        inner.cancel = Some(cancel.clone());
        Ok(RunTicket {
            generation: inner.generation,
            cancel,
            latest: self.latest.clone(),
        })
    }

    /// Refresh the start time for the next task of a batch.
    pub fn restart_clock(&self, ticket: &RunTicket) {
        let mut inner = self.lock();
        if inner.generation == ticket.generation && inner.is_running {
            inner.started_at = Some(Instant::now());
        }
    }

    /// Release the state. A stale ticket leaves a newer run alone.
    pub fn finish(&self, ticket: &RunTicket) {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            return;
        }
        inner.is_running = false;
        inner.stop_requested = false;
        inner.started_at = None;
        inner.cancel = None;
    }

    /// Ask the current run to stop. Returns the generation that was signalled,
    /// or `None` when nothing is running.
    pub fn request_stop(&self) -> Option<u64> {
        let mut inner = self.lock();
        if !inner.is_running {
            return None;
        }
        inner.stop_requested = true;
        if let Some(cancel) = &inner.cancel {
            cancel.store(true, Ordering::Relaxed);
        }
        Some(inner.generation)
    }

    /// Grace-period release after a stop: clears the flags if `generation`
    /// still holds the state.
    pub fn release_stopped(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.is_running {
            inner.is_running = false;
            inner.stop_requested = false;
            inner.started_at = None;
            inner.cancel = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.lock().started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_rejected() {
        let state = ProcessState::new();
        let ticket = state.try_begin().unwrap();
        assert!(state.is_running());
        assert!(state.started_at().is_some());
        assert!(matches!(state.try_begin(), Err(EngineError::AlreadyRunning)));

        state.finish(&ticket);
        assert!(!state.is_running());
        assert!(state.started_at().is_none());
        assert!(state.try_begin().is_ok());
    }

    #[test]
    fn stop_requires_a_running_process() {
        let state = ProcessState::new();
        assert_eq!(state.request_stop(), None);
        assert!(!state.stop_requested());

        let ticket = state.try_begin().unwrap();
        assert_eq!(state.request_stop(), Some(ticket.generation()));
        assert!(state.stop_requested());
        assert!(ticket.is_cancelled());

        state.finish(&ticket);
        assert!(!state.stop_requested());
        assert!(!state.is_running());
    }

    #[test]
    fn cancellation_outlives_grace_release() {
        let state = ProcessState::new();
        let ticket = state.try_begin().unwrap();
        let generation = state.request_stop().unwrap();
        state.release_stopped(generation);

        assert!(!state.is_running());
        assert!(ticket.is_cancelled());
    }

    #[test]
    fn stale_ticket_does_not_release_newer_run() {
        let state = ProcessState::new();
        let old = state.try_begin().unwrap();
        let generation = state.request_stop().unwrap();
        state.release_stopped(generation);

        let current = state.try_begin().unwrap();
        state.finish(&old);
        state.release_stopped(generation);
        assert!(state.is_running());
        assert!(!current.is_cancelled());

        state.finish(&current);
        assert!(!state.is_running());
    }

    #[test]
    fn only_a_newer_run_supersedes_a_ticket() {
        let state = ProcessState::new();
        let old = state.try_begin().unwrap();
        let generation = state.request_stop().unwrap();
        state.release_stopped(generation);
        assert!(!old.is_superseded());

        let current = state.try_begin().unwrap();
        assert!(old.is_superseded());
        assert!(!current.is_superseded());
    }
}
