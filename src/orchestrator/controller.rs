//! Run lifecycle controller.
//!
//! Spawns single tasks and batches on the runtime, forwards stop requests to the engine
//! immediately, and waits for in-flight runs to drain before quitting.

use crate::engine::TaskEngine;
use crate::model::{BatchReport, Notice, TaskEvent, TaskReport, Workflow};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::Duration;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    RunOne { workflow: Workflow, entity_id: u64 },
    RunAll { workflow: Workflow, ids: Vec<u64> },
    Stop,
    Quit,
}

#[derive(Debug)]
enum RunDone {
    Single(TaskReport),
    Batch(BatchReport),
}

/// Execute UI commands against the engine until quit.
pub(crate) async fn run_controller(
    engine: Arc<TaskEngine>,
    event_tx: UnboundedSender<TaskEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    // A stopped run may still be draining its current sleep while a new one starts,
    // so more than one handle can be alive.
    let mut runs: JoinSet<RunDone> = JoinSet::new();
    let mut quit_pending = false;
    let mut stop_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    let notice = |msg: &str| {
        let _ = event_tx.send(TaskEvent::Notice(Notice::Message(msg.to_string())));
    };

    loop {
        tokio::select! {
            // Once quitting, the UI side is gone and recv() would return None forever.
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::RunOne { workflow, entity_id }) => {
                        let engine = engine.clone();
                        runs.spawn(async move {
                            RunDone::Single(engine.run_task(workflow, entity_id, None).await)
                        });
                    }
                    Some(UiCommand::RunAll { workflow, ids }) => {
                        let engine = engine.clone();
                        runs.spawn(async move { RunDone::Batch(engine.run_all(workflow, &ids).await) });
                    }
                    Some(UiCommand::Stop) => engine.stop_all(),
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        if runs.is_empty() {
                            break;
                        }
                        engine.stop_all();
                        notice("Stopping…");
                        stop_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(3));
                    }
                }
            }
            done = async {
                if runs.is_empty() {
                    futures::future::pending().await
                } else {
                    runs.join_next().await
                }
            } => {
                match done {
                    Some(Ok(RunDone::Single(report))) => {
                        tracing::debug!(?report, "task run finished");
                    }
                    Some(Ok(RunDone::Batch(report))) => {
                        tracing::debug!(
                            workflow = report.workflow.label(),
                            processed = report.entries.len(),
                            stopped = report.stopped,
                            "batch run finished"
                        );
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "run task join failed");
                        notice(&format!("Run join failed: {e}"));
                    }
                    None => {}
                }
                if quit_pending && runs.is_empty() {
                    break;
                }
            }
            // A stopped run only exits at its next checkpoint; keep the user informed.
            _ = watchdog.tick() => {
                if let Some(deadline) = stop_deadline {
                    if tokio::time::Instant::now() >= deadline && !runs.is_empty() {
                        notice("Still stopping…");
                        stop_deadline = None;
                    }
                }
            }
        }
    }

    Ok(())
}
