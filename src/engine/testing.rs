//! In-memory backend and engine fixtures for engine tests.

use super::{Backend, ProcessState, TaskEngine};
use crate::board::Board;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    ContactMethod, CoordinationResult, FollowupResult, TaskEvent, TaskOutcome, TaskResponse,
    Timing, VerificationResult, WorkDelay, Workflow,
};
use crate::roster::{self, Roster};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Canned replies keyed by workflow and entity; anything else is a 404.
#[derive(Default)]
pub struct FakeBackend {
    replies: Mutex<HashMap<(Workflow, u64), TaskResponse>>,
    calls: Mutex<Vec<(Workflow, u64)>>,
    stops: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, workflow: Workflow, entity_id: u64, steps: Vec<String>, outcome: TaskOutcome) {
        self.replies.lock().unwrap().insert(
            (workflow, entity_id),
            TaskResponse {
                steps,
                outcome,
                timestamp: None,
            },
        );
    }

    pub fn calls(&self) -> Vec<(Workflow, u64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn dispatch(&self, workflow: Workflow, entity_id: u64) -> EngineResult<TaskResponse> {
        self.calls.lock().unwrap().push((workflow, entity_id));
        self.replies
            .lock()
            .unwrap()
            .get(&(workflow, entity_id))
            .cloned()
            .ok_or(EngineError::Server {
                status: 404,
                message: "not found".into(),
            })
    }

    async fn stop(&self) -> EngineResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Each step takes 1500 ms; batch items are 2000 ms apart.
pub fn timing() -> Timing {
    Timing {
        settle_delay: Duration::from_millis(500),
        work_delay: WorkDelay::Fixed(Duration::from_millis(1000)),
        pacing_delay: Duration::from_millis(2000),
        stop_grace: Duration::from_millis(100),
    }
}

pub fn engine(backend: Arc<FakeBackend>) -> (Arc<TaskEngine>, mpsc::UnboundedReceiver<TaskEvent>) {
    engine_with(backend, &roster::demo())
}

pub fn engine_with(
    backend: Arc<FakeBackend>,
    roster: &Roster,
) -> (Arc<TaskEngine>, mpsc::UnboundedReceiver<TaskEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = TaskEngine::new(
        Arc::new(ProcessState::new()),
        Arc::new(Mutex::new(Board::from_roster(roster))),
        backend,
        timing(),
        tx,
    );
    (Arc::new(engine), rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn steps(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Step {i}")).collect()
}

pub fn verification(status: &str) -> TaskOutcome {
    TaskOutcome::Verification(VerificationResult {
        verification_status: status.into(),
        patient_name: "Sarah Johnson".into(),
        insurance_active: Some(true),
        coverage_type: Some("PPO".into()),
        copay: Some("$25".into()),
        deductible_remaining: Some("$450".into()),
        prior_auth_required: Some(false),
        effective_date: Some("2024-01-01".into()),
        call_duration: "2m 15s".into(),
        confidence_score: 98,
        failure_reason: None,
        recommended_action: None,
    })
}

pub fn followup() -> TaskOutcome {
    TaskOutcome::Followup(FollowupResult {
        claim_number: "CLM2024001".into(),
        patient_name: "Sarah Johnson".into(),
        original_status: "pending".into(),
        new_status: "Resubmitted with corrections".into(),
        action_taken: "Corrected diagnosis code".into(),
        expected_resolution: "5-7 business days".into(),
        processing_time: "3m 10s".into(),
        confidence_score: 95,
        recovery_amount: "$250.00".into(),
    })
}

pub fn coordination(contact_successful: bool) -> TaskOutcome {
    TaskOutcome::Coordination(CoordinationResult {
        patient_name: "Thomas Brown".into(),
        task_type: "Lab Results Review".into(),
        contact_method: ContactMethod::Phone,
        contact_successful,
        action_completed: "Appointment scheduled".into(),
        next_step: "Follow-up visit on Friday".into(),
        expected_response: None,
        processing_time: "1m 45s".into(),
        confidence_score: 96,
        patient_satisfaction: Some("High".into()),
    })
}
