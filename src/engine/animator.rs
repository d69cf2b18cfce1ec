use crate::engine::state::RunTicket;
use crate::error::{EngineError, EngineResult};
use crate::model::{StepRecord, StepStatus, TaskEvent, Timing, Workflow};
use tokio::sync::mpsc;

const VERIFICATION_ICONS: [&str; 7] = ["📞", "🤖", "🔄", "👥", "🔍", "📋", "✅"];
const FOLLOWUP_ICONS: [&str; 7] = ["🔐", "🔑", "🔍", "📊", "📄", "📤", "✅"];
const COORDINATION_ICONS: [&str; 7] = ["🔍", "📝", "📞", "💬", "📋", "📅", "✅"];
const PLACEHOLDER_ICON: &str = "⏳";
pub const COMPLETED_ICON: &str = "✅";
pub const CANCELLED_ICON: &str = "❌";

/// Icon for a freshly rendered step.
pub fn step_icon(workflow: Workflow, index: usize, label: &str) -> &'static str {
    let palette = match workflow {
        Workflow::Coordination => &COORDINATION_ICONS,
        _ if label.contains("portal") || label.contains("claim") => &FOLLOWUP_ICONS,
        _ => &VERIFICATION_ICONS,
    };
    palette.get(index).copied().unwrap_or(PLACEHOLDER_ICON)
}

/// Animate `steps` one at a time: Pending, then Active after the settle
/// delay, then Completed after a work delay.
///
/// On any checkpoint that sees a stop, the current step (if rendered) and all
/// remaining steps are emitted as Cancelled and `StoppedByUser` is returned.
pub async fn animate(
    workflow: Workflow,
    entity_id: u64,
    steps: &[String],
    ticket: &RunTicket,
    timing: &Timing,
    event_tx: &mpsc::UnboundedSender<TaskEvent>,
) -> EngineResult<Vec<StepRecord>> {
    let mut records: Vec<StepRecord> = Vec::with_capacity(steps.len());

    for (i, label) in steps.iter().enumerate() {
        if ticket.is_cancelled() {
            return Err(cancel_from(workflow, entity_id, steps, i, &mut records, ticket, event_tx));
        }

        let record = StepRecord {
            index: i,
            label: label.clone(),
            icon: step_icon(workflow, i, label),
            status: StepStatus::Pending,
        };
        emit(workflow, entity_id, steps.len(), event_tx, &record);
        records.push(record);

        tokio::time::sleep(timing.settle_delay).await;
        if ticket.is_cancelled() {
            return Err(cancel_from(workflow, entity_id, steps, i, &mut records, ticket, event_tx));
        }
        records[i].status = StepStatus::Active;
        emit(workflow, entity_id, steps.len(), event_tx, &records[i]);

        tokio::time::sleep(timing.work_delay.sample()).await;
        if ticket.is_cancelled() {
            return Err(cancel_from(workflow, entity_id, steps, i, &mut records, ticket, event_tx));
        }
        records[i].icon = COMPLETED_ICON;
        records[i].status = StepStatus::Completed;
        emit(workflow, entity_id, steps.len(), event_tx, &records[i]);
    }

    Ok(records)
}

fn emit(
    workflow: Workflow,
    entity_id: u64,
    total: usize,
    event_tx: &mpsc::UnboundedSender<TaskEvent>,
    record: &StepRecord,
) {
    tracing::debug!(entity_id, index = record.index, status = ?record.status, "{}", record.label);
    let _ = event_tx.send(TaskEvent::Step {
        workflow,
        entity_id,
        total,
        record: record.clone(),
    });
}

/// Mark steps `from..` Cancelled, reusing the record for `from` if it was
/// already rendered. A superseded run records the cancellation silently.
fn cancel_from(
    workflow: Workflow,
    entity_id: u64,
    steps: &[String],
    from: usize,
    records: &mut Vec<StepRecord>,
    ticket: &RunTicket,
    event_tx: &mpsc::UnboundedSender<TaskEvent>,
) -> EngineError {
    let quiet = ticket.is_superseded();
    for (j, label) in steps.iter().enumerate().skip(from) {
        if j >= records.len() {
            records.push(StepRecord {
                index: j,
                label: label.clone(),
                icon: step_icon(workflow, j, label),
                status: StepStatus::Pending,
            });
        }
        records[j].icon = CANCELLED_ICON;
        records[j].status = StepStatus::Cancelled;
        if !quiet {
            emit(workflow, entity_id, steps.len(), event_tx, &records[j]);
        }
    }
    EngineError::StoppedByUser
}
