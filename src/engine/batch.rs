use super::TaskEngine;
use crate::error::EngineError;
use crate::model::{BatchReport, EntityReport, Notice, TaskEvent, Workflow};

impl TaskEngine {
    /// Run `workflow` over `ids` in order, one task at a time, with the
    /// pacing delay between items. A stop ends the batch at the next item.
    pub async fn run_all(&self, workflow: Workflow, ids: &[u64]) -> BatchReport {
        if ids.is_empty() {
            tracing::warn!("batch rejected: {}", EngineError::NothingPending(workflow));
            self.notify(Notice::NothingPending(workflow));
            return BatchReport::rejected(workflow);
        }
        let ticket = match self.state.try_begin() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(workflow = workflow.label(), "batch rejected: {e}");
                self.notify(Notice::AlreadyRunning);
                return BatchReport::rejected(workflow);
            }
        };

        tracing::info!(workflow = workflow.label(), total = ids.len(), "batch started");
        self.emit(TaskEvent::BatchStarted {
            workflow,
            total: ids.len(),
        });

        let mut entries = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            if ticket.is_cancelled() {
                break;
            }
            let report = self.run_task(workflow, id, Some(&ticket)).await;
            entries.push(EntityReport {
                entity_id: id,
                report,
            });
            if i + 1 < ids.len() && !ticket.is_cancelled() {
                tokio::time::sleep(self.timing.pacing_delay).await;
            }
        }

        let stopped = ticket.is_cancelled();
        tracing::info!(
            workflow = workflow.label(),
            processed = entries.len(),
            stopped,
            "batch finished"
        );
        self.emit(TaskEvent::BatchFinished {
            workflow,
            processed: entries.len(),
            stopped,
        });
        self.state.finish(&ticket);

        BatchReport {
            workflow,
            entries,
            stopped,
            rejected: false,
        }
    }
}
