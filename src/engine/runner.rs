use super::animator;
use super::state::RunTicket;
use super::TaskEngine;
use crate::error::EngineError;
use crate::model::{Notice, TaskEvent, TaskReport, Workflow};

impl TaskEngine {
    /// Run one task for `entity_id`.
    ///
    /// `batch` is the ticket of the batch this task belongs to; a batch task
    /// skips the busy check and leaves releasing the state to the batch.
    pub async fn run_task(
        &self,
        workflow: Workflow,
        entity_id: u64,
        batch: Option<&RunTicket>,
    ) -> TaskReport {
        let owned;
        let ticket = match batch {
            Some(t) => {
                self.state.restart_clock(t);
                t
            }
            None => match self.state.try_begin() {
                Ok(t) => {
                    owned = t;
                    &owned
                }
                Err(e) => {
                    tracing::warn!(workflow = workflow.label(), entity_id, "rejected: {e}");
                    self.notify(Notice::AlreadyRunning);
                    return TaskReport::Rejected;
                }
            },
        };

        let report = self.run_accepted(workflow, entity_id, ticket).await;

        if batch.is_none() {
            self.state.finish(ticket);
        }
        report
    }

    async fn run_accepted(
        &self,
        workflow: Workflow,
        entity_id: u64,
        ticket: &RunTicket,
    ) -> TaskReport {
        let kind = workflow.card_kind();
        let label = {
            let mut board = self.board_mut();
            let Some(label) = board.get(kind, entity_id).map(|c| c.task_label()) else {
                drop(board);
                tracing::warn!(workflow = workflow.label(), entity_id, "unknown entity");
                self.notify(Notice::UnknownEntity {
                    workflow,
                    entity_id,
                });
                return TaskReport::Failed {
                    reason: EngineError::UnknownEntity {
                        workflow,
                        entity_id,
                    }
                    .to_string(),
                };
            };
            board.mark_in_progress(kind, entity_id);
            label
        };

        tracing::info!(workflow = workflow.label(), entity_id, "{label}: task started");
        self.emit(TaskEvent::TaskStarted {
            workflow,
            entity_id,
            label,
        });

        let response = match self.backend.dispatch(workflow, entity_id).await {
            Ok(r) => r,
            // The result of a stopped run is dropped even when the request failed.
            Err(_) if ticket.is_cancelled() => return self.cancelled(workflow, entity_id, ticket),
            Err(e) => return self.failed(workflow, entity_id, e),
        };

        match animator::animate(
            workflow,
            entity_id,
            &response.steps,
            ticket,
            &self.timing,
            &self.event_tx,
        )
        .await
        {
            // A stop that lands after the last checkpoint still suppresses results.
            Ok(_) if ticket.is_cancelled() => return self.cancelled(workflow, entity_id, ticket),
            Ok(_) => {}
            Err(e) if e.is_stop() => return self.cancelled(workflow, entity_id, ticket),
            Err(e) => return self.failed(workflow, entity_id, e),
        }

        self.board_mut().settle(kind, entity_id, &response.outcome);
        tracing::info!(
            workflow = workflow.label(),
            entity_id,
            success = response.outcome.is_success(),
            backend_time = response.timestamp.as_deref().unwrap_or("-"),
            "task completed"
        );
        self.emit(TaskEvent::TaskCompleted {
            workflow,
            entity_id,
            outcome: Box::new(response.outcome.clone()),
        });
        TaskReport::Completed {
            outcome: response.outcome,
        }
    }

    fn cancelled(&self, workflow: Workflow, entity_id: u64, ticket: &RunTicket) -> TaskReport {
        // stop_all already restored the card; a newer run may own it by now.
        if ticket.is_superseded() {
            tracing::debug!(
                workflow = workflow.label(),
                entity_id,
                generation = ticket.generation(),
                "stopped run finished after a newer run started"
            );
            return TaskReport::Cancelled;
        }
        self.board_mut().restore(workflow.card_kind(), entity_id);
        tracing::info!(workflow = workflow.label(), entity_id, "task stopped by user");
        self.emit(TaskEvent::TaskCancelled {
            workflow,
            entity_id,
        });
        TaskReport::Cancelled
    }

    fn failed(&self, workflow: Workflow, entity_id: u64, err: EngineError) -> TaskReport {
        tracing::error!(workflow = workflow.label(), entity_id, error = %err, "task failed");
        self.board_mut().restore(workflow.card_kind(), entity_id);
        let reason = err.to_string();
        self.emit(TaskEvent::TaskFailed {
            workflow,
            entity_id,
            reason: reason.clone(),
        });
        self.notify(Notice::TaskFailed(workflow));
        TaskReport::Failed { reason }
    }
}

#[cfg(test)]
mod tests {
    use crate::board::{CardKind, CardStatus, Trigger};
    use crate::engine::testing::{self, FakeBackend};
    use crate::model::{Notice, StepStatus, TaskEvent, TaskReport, Workflow};
    use crate::monitor::MonitorState;
    use crate::roster::{self, Roster};
    use std::time::{Duration, Instant};

    #[tokio::test(start_paused = true)]
    async fn verified_patient_lands_in_success_state() {
        let mut roster = Roster::default();
        let mut patient = roster::demo().patients[0].clone();
        patient.id = 42;
        roster.patients.push(patient);

        let backend = FakeBackend::new();
        backend.respond(
            Workflow::Verification,
            42,
            testing::steps(5),
            testing::verification("success"),
        );
        let (engine, mut rx) = testing::engine_with(backend.clone(), &roster);

        let report = engine.run_task(Workflow::Verification, 42, None).await;
        assert!(matches!(report, TaskReport::Completed { .. }));
        assert_eq!(backend.calls(), vec![(Workflow::Verification, 42)]);

        let board = engine.board().lock().unwrap();
        let card = board.get(CardKind::Patient, 42).unwrap();
        assert_eq!(card.status, CardStatus::Succeeded);
        assert_eq!(card.view().trigger, Trigger::Hidden);
        drop(board);

        let events = testing::drain(&mut rx);
        let completed_steps = events
            .iter()
            .filter(|e| matches!(e, TaskEvent::Step { record, .. } if record.status == StepStatus::Completed))
            .count();
        assert_eq!(completed_steps, 5);
        assert!(matches!(events.last(), Some(TaskEvent::TaskCompleted { entity_id: 42, .. })));
        assert!(!engine.state().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_is_rejected_while_running() {
        let backend = FakeBackend::new();
        backend.respond(
            Workflow::Verification,
            1,
            testing::steps(2),
            testing::verification("success"),
        );
        let (engine, mut rx) = testing::engine(backend.clone());

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_task(Workflow::Verification, 1, None).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.state().is_running());

        let second = engine.run_task(Workflow::Verification, 2, None).await;
        assert!(matches!(second, TaskReport::Rejected));
        assert_eq!(
            engine.board().lock().unwrap().status(CardKind::Patient, 2),
            Some(CardStatus::Idle)
        );

        assert!(matches!(first.await.unwrap(), TaskReport::Completed { .. }));
        assert!(!engine.state().is_running());
        assert_eq!(backend.calls(), vec![(Workflow::Verification, 1)]);
        assert!(testing::drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TaskEvent::Notice(Notice::AlreadyRunning))));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_first_step_cancels_coordination() {
        let backend = FakeBackend::new();
        backend.respond(
            Workflow::Coordination,
            201,
            testing::steps(7),
            testing::coordination(true),
        );
        let (engine, mut rx) = testing::engine(backend.clone());

        let run = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_task(Workflow::Coordination, 201, None).await })
        };
        // Step 0 is active at 600 ms; its work delay ends at 1500 ms.
        tokio::time::sleep(Duration::from_millis(600)).await;
        engine.stop_all();

        assert!(matches!(run.await.unwrap(), TaskReport::Cancelled));
        assert_eq!(
            engine.board().lock().unwrap().status(CardKind::CareTask, 201),
            Some(CardStatus::Idle)
        );
        assert!(!engine.state().is_running());
        assert!(!engine.state().stop_requested());

        let mut last = [None; 7];
        let mut saw_result = false;
        for ev in testing::drain(&mut rx) {
            match ev {
                TaskEvent::Step { record, .. } => last[record.index] = Some(record.status),
                TaskEvent::TaskCompleted { .. } => saw_result = true,
                _ => {}
            }
        }
        assert!(!saw_result);
        assert!(last.iter().all(|s| *s == Some(StepStatus::Cancelled)));

        tokio::task::yield_now().await;
        assert_eq!(backend.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rerun_after_stop_keeps_the_new_run_on_screen() {
        let backend = FakeBackend::new();
        backend.respond(
            Workflow::Coordination,
            201,
            testing::steps(7),
            testing::coordination(true),
        );
        let (engine, mut rx) = testing::engine(backend.clone());
        let mut monitor = MonitorState::default();

        let stopped = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_task(Workflow::Coordination, 201, None).await })
        };
        tokio::time::sleep(Duration::from_millis(600)).await;
        engine.stop_all();
        // The grace period has released the state; the stopped run still sleeps until 1500 ms.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!engine.state().is_running());

        let rerun = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_task(Workflow::Coordination, 201, None).await })
        };
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert!(matches!(stopped.await.unwrap(), TaskReport::Cancelled));
        assert!(engine.state().is_running());
        assert_eq!(
            engine.board().lock().unwrap().status(CardKind::CareTask, 201),
            Some(CardStatus::InProgress)
        );

        let now = Instant::now();
        let events = testing::drain(&mut rx);
        for ev in &events {
            monitor.apply(ev, now);
        }
        assert!(matches!(monitor, MonitorState::Progress { entity_id: 201, .. }));
        if let MonitorState::Progress { steps, .. } = &monitor {
            assert!(steps.iter().all(|s| s.status != StepStatus::Cancelled));
        }
        assert!(!events
            .iter()
            .any(|e| matches!(e, TaskEvent::TaskCancelled { .. })));

        assert!(matches!(rerun.await.unwrap(), TaskReport::Completed { .. }));
        assert_eq!(
            engine.board().lock().unwrap().status(CardKind::CareTask, 201),
            Some(CardStatus::Succeeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_restores_card_and_notifies() {
        let backend = FakeBackend::new();
        let (engine, mut rx) = testing::engine(backend.clone());

        let report = engine.run_task(Workflow::Followup, 103, None).await;
        match report {
            TaskReport::Failed { reason } => assert!(reason.contains("404")),
            other => panic!("unexpected report {other:?}"),
        }

        let board = engine.board().lock().unwrap();
        let card = board.get(CardKind::Claim, 103).unwrap();
        assert_eq!(card.status, CardStatus::Idle);
        assert_eq!(card.view().badge, "Denied");
        drop(board);

        assert!(!engine.state().is_running());
        let events = testing::drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, TaskEvent::Notice(Notice::TaskFailed(Workflow::Followup)))));
        assert!(!events.iter().any(|e| matches!(e, TaskEvent::Step { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_entity_makes_no_request() {
        let backend = FakeBackend::new();
        let (engine, mut rx) = testing::engine(backend.clone());

        let report = engine.run_task(Workflow::Coordination, 999, None).await;
        assert!(matches!(report, TaskReport::Failed { .. }));
        assert!(backend.calls().is_empty());
        assert!(!engine.state().is_running());
        assert!(testing::drain(&mut rx).iter().any(|e| matches!(
            e,
            TaskEvent::Notice(Notice::UnknownEntity { entity_id: 999, .. })
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_contact_is_a_failure_variant() {
        let backend = FakeBackend::new();
        backend.respond(
            Workflow::Coordination,
            204,
            testing::steps(3),
            testing::coordination(false),
        );
        let (engine, _rx) = testing::engine(backend);

        let report = engine.run_task(Workflow::Coordination, 204, None).await;
        assert!(matches!(report, TaskReport::Completed { .. }));
        let board = engine.board().lock().unwrap();
        assert_eq!(board.status(CardKind::CareTask, 204), Some(CardStatus::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_only_notifies_backend() {
        let backend = FakeBackend::new();
        let (engine, mut rx) = testing::engine(backend.clone());

        engine.stop_all();
        assert!(!engine.state().is_running());
        assert!(!engine.state().stop_requested());
        tokio::task::yield_now().await;
        assert_eq!(backend.stops(), 1);
        assert!(matches!(
            testing::drain(&mut rx).as_slice(),
            [TaskEvent::StopRequested]
        ));
    }
}
