mod animator;
mod backend;
mod batch;
mod runner;
mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, HttpBackend};
pub use state::ProcessState;

use crate::board::Board;
use crate::model::{Notice, TaskEvent, Timing};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Runs office tasks against the backend, one at a time.
pub struct TaskEngine {
    state: Arc<ProcessState>,
    board: Arc<Mutex<Board>>,
    backend: Arc<dyn Backend>,
    timing: Timing,
    event_tx: mpsc::UnboundedSender<TaskEvent>,
}

impl TaskEngine {
    pub fn new(
        state: Arc<ProcessState>,
        board: Arc<Mutex<Board>>,
        backend: Arc<dyn Backend>,
        timing: Timing,
        event_tx: mpsc::UnboundedSender<TaskEvent>,
    ) -> Self {
        Self {
            state,
            board,
            backend,
            timing,
            event_tx,
        }
    }

    pub fn state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    pub fn board(&self) -> &Arc<Mutex<Board>> {
        &self.board
    }

    fn board_mut(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, ev: TaskEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn notify(&self, notice: Notice) {
        self.emit(TaskEvent::Notice(notice));
    }

    /// Stop whatever is running.
    ///
    /// Signals the running task or batch, restores every in-progress card,
    /// notifies the backend without waiting for it, and force-releases the
    /// process state after the stop grace period.
    pub fn stop_all(&self) {
        let running_for = self.state.started_at().map(|t| t.elapsed());
        let generation = self.state.request_stop();
        let restored = self.board_mut().restore_all_in_progress();
        tracing::info!(?generation, ?running_for, restored, "stop requested");
        self.emit(TaskEvent::StopRequested);

        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.stop().await {
                tracing::debug!(error = %e, "stop notification failed");
            }
        });

        if let Some(generation) = generation {
            let state = self.state.clone();
            let grace = self.timing.stop_grace;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                state.release_stopped(generation);
            });
        }
    }
}
