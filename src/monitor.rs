//! Live monitor model: what the right-hand panel shows for the current task.

use crate::model::{StepRecord, TaskEvent, Workflow};
use crate::text_summary::{render_outcome, ResultView};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub(crate) enum MonitorState {
    #[default]
    Idle,
    Progress {
        workflow: Workflow,
        entity_id: u64,
        label: String,
        title: &'static str,
        started_at: Instant,
        steps: Vec<StepRecord>,
    },
    Results {
        workflow: Workflow,
        view: ResultView,
    },
}

impl MonitorState {
    /// Fold one engine event into the monitor. Events for any task other than
    /// the one on screen are ignored.
    pub fn apply(&mut self, ev: &TaskEvent, now: Instant) {
        match ev {
            TaskEvent::TaskStarted {
                workflow,
                entity_id,
                label,
            } => {
                *self = MonitorState::Progress {
                    workflow: *workflow,
                    entity_id: *entity_id,
                    label: label.clone(),
                    title: workflow.monitor_title(),
                    started_at: now,
                    steps: Vec::new(),
                };
            }
            TaskEvent::Step {
                workflow,
                entity_id,
                record,
                ..
            } => {
                if !self.is_showing(*workflow, *entity_id) {
                    return;
                }
                if let MonitorState::Progress { steps, .. } = self {
                    match steps.get_mut(record.index) {
                        Some(slot) => *slot = record.clone(),
                        None => steps.push(record.clone()),
                    }
                }
            }
            TaskEvent::TaskCompleted {
                workflow,
                entity_id,
                outcome,
            } => {
                if self.is_showing(*workflow, *entity_id) {
                    *self = MonitorState::Results {
                        workflow: *workflow,
                        view: render_outcome(outcome),
                    };
                }
            }
            TaskEvent::TaskCancelled {
                workflow,
                entity_id,
            }
            | TaskEvent::TaskFailed {
                workflow,
                entity_id,
                ..
            } => {
                if self.is_showing(*workflow, *entity_id) {
                    *self = MonitorState::Idle;
                }
            }
            TaskEvent::StopRequested => {
                if matches!(self, MonitorState::Progress { .. }) {
                    *self = MonitorState::Idle;
                }
            }
            TaskEvent::BatchStarted { .. }
            | TaskEvent::BatchFinished { .. }
            | TaskEvent::Notice(_) => {}
        }
    }

    fn is_showing(&self, wf: Workflow, id: u64) -> bool {
        matches!(
            self,
            MonitorState::Progress { workflow, entity_id, .. } if *workflow == wf && *entity_id == id
        )
    }

    pub fn close_results(&mut self) {
        if matches!(self, MonitorState::Results { .. }) {
            *self = MonitorState::Idle;
        }
    }

    /// Elapsed timer text while a task is on screen.
    pub fn timer(&self, now: Instant) -> Option<String> {
        match self {
            MonitorState::Progress { started_at, .. } => {
                Some(format_elapsed(now.saturating_duration_since(*started_at)))
            }
            _ => None,
        }
    }
}

/// `mm:ss`, minutes not wrapped at an hour.
pub(crate) fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepStatus;

    fn started(id: u64) -> TaskEvent {
        TaskEvent::TaskStarted {
            workflow: Workflow::Coordination,
            entity_id: id,
            label: "Thomas Brown - Lab Results Review".into(),
        }
    }

    fn step(id: u64, index: usize, status: StepStatus) -> TaskEvent {
        TaskEvent::Step {
            workflow: Workflow::Coordination,
            entity_id: id,
            total: 2,
            record: StepRecord {
                index,
                label: format!("Step {index}"),
                icon: "🔍",
                status,
            },
        }
    }

    #[test]
    fn elapsed_is_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_millis(999)), "00:00");
        assert_eq!(format_elapsed(Duration::from_secs(75)), "01:15");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "60:00");
    }

    #[test]
    fn steps_update_in_place() {
        let t0 = Instant::now();
        let mut m = MonitorState::default();
        m.apply(&started(201), t0);
        m.apply(&step(201, 0, StepStatus::Pending), t0);
        m.apply(&step(201, 0, StepStatus::Active), t0);
        m.apply(&step(201, 1, StepStatus::Pending), t0);

        let MonitorState::Progress { title, steps, .. } = &m else {
            panic!("expected progress");
        };
        assert_eq!(*title, "👥 Live Care Coordination Monitor - Processing");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].status, StepStatus::Active);
        assert_eq!(m.timer(t0 + Duration::from_secs(5)).as_deref(), Some("00:05"));
    }

    #[test]
    fn stop_returns_to_idle_and_ignores_late_steps() {
        let t0 = Instant::now();
        let mut m = MonitorState::default();
        m.apply(&started(201), t0);
        m.apply(&TaskEvent::StopRequested, t0);
        assert!(matches!(m, MonitorState::Idle));
        assert!(m.timer(t0).is_none());

        m.apply(&step(201, 0, StepStatus::Cancelled), t0);
        assert!(matches!(m, MonitorState::Idle));
    }

    #[test]
    fn stray_events_from_another_task_are_ignored() {
        let t0 = Instant::now();
        let mut m = MonitorState::default();
        m.apply(&started(202), t0);
        m.apply(&step(201, 0, StepStatus::Cancelled), t0);
        m.apply(
            &TaskEvent::TaskCancelled {
                workflow: Workflow::Coordination,
                entity_id: 201,
            },
            t0,
        );
        let MonitorState::Progress { entity_id, steps, .. } = &m else {
            panic!("expected progress");
        };
        assert_eq!(*entity_id, 202);
        assert!(steps.is_empty());
    }

    #[test]
    fn completion_shows_results_until_closed() {
        let t0 = Instant::now();
        let mut m = MonitorState::default();
        m.apply(&started(201), t0);
        m.apply(
            &TaskEvent::TaskCompleted {
                workflow: Workflow::Coordination,
                entity_id: 201,
                outcome: Box::new(crate::engine::testing::coordination(true)),
            },
            t0,
        );
        let MonitorState::Results { view, .. } = &m else {
            panic!("expected results");
        };
        assert_eq!(view.title, "✅ Coordination Complete");

        m.close_results();
        assert!(matches!(m, MonitorState::Idle));
    }
}
