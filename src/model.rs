use crate::board::CardKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_url: String,
    pub user_agent: String,
    #[serde(default)]
    pub roster_path: Option<std::path::PathBuf>,
    pub timing: Timing,
}

/// Delays that pace the simulated "live call" animation and batch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    /// Pause between rendering a step and marking it active.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    pub work_delay: WorkDelay,
    /// Pause between two batch items.
    #[serde(with = "humantime_serde")]
    pub pacing_delay: Duration,
    /// How long `stop_all` waits before force-releasing the process state.
    #[serde(with = "humantime_serde")]
    pub stop_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            work_delay: WorkDelay::Uniform {
                min: Duration::from_millis(1000),
                max: Duration::from_millis(3000),
            },
            pacing_delay: Duration::from_millis(2000),
            stop_grace: Duration::from_millis(100),
        }
    }
}

/// Simulated processing time of one step. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkDelay {
    Uniform {
        #[serde(with = "humantime_serde")]
        min: Duration,
        #[serde(with = "humantime_serde")]
        max: Duration,
    },
    Fixed(#[serde(with = "humantime_serde")] Duration),
}

impl WorkDelay {
    /// Draw a delay from `[min, max)`; a degenerate range yields `min`.
    pub fn sample(&self) -> Duration {
        match *self {
            WorkDelay::Fixed(d) => d,
            WorkDelay::Uniform { min, max } if max <= min => min,
            WorkDelay::Uniform { min, max } => rand::thread_rng().gen_range(min..max),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let (min, max) = match *self {
            WorkDelay::Fixed(d) => (d, d),
            WorkDelay::Uniform { min, max } => (min, max),
        };
        if min.is_zero() {
            return Err("work delay must be strictly positive".into());
        }
        if max < min {
            return Err(format!(
                "work delay max ({}) is below min ({})",
                humantime::format_duration(max),
                humantime::format_duration(min)
            ));
        }
        Ok(())
    }
}

/// The three office workflows and their backend contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    Verification,
    Followup,
    Coordination,
}

impl Workflow {
    pub fn endpoint(self) -> &'static str {
        match self {
            Workflow::Verification => "/api/verify-insurance",
            Workflow::Followup => "/api/follow-up-claim",
            Workflow::Coordination => "/api/coordinate-care",
        }
    }

    /// Request body key carrying the entity id.
    pub fn id_field(self) -> &'static str {
        match self {
            Workflow::Verification => "patient_id",
            Workflow::Followup => "claim_id",
            Workflow::Coordination => "task_id",
        }
    }

    pub fn steps_field(self) -> &'static str {
        match self {
            Workflow::Verification => "call_steps",
            Workflow::Followup => "followup_steps",
            Workflow::Coordination => "coordination_steps",
        }
    }

    pub fn result_field(self) -> &'static str {
        match self {
            Workflow::Verification => "verification_result",
            Workflow::Followup => "followup_result",
            Workflow::Coordination => "coordination_result",
        }
    }

    pub fn card_kind(self) -> CardKind {
        match self {
            Workflow::Verification => CardKind::Patient,
            Workflow::Followup => CardKind::Claim,
            Workflow::Coordination => CardKind::CareTask,
        }
    }

    pub fn monitor_title(self) -> &'static str {
        match self {
            Workflow::Verification => "📞 Live AI Monitor - Verifying",
            Workflow::Followup => "📞 Live AI Monitor - Following up",
            Workflow::Coordination => "👥 Live Care Coordination Monitor - Processing",
        }
    }

    pub fn idle_title(self) -> &'static str {
        match self {
            Workflow::Verification | Workflow::Followup => "📞 Live AI Monitor",
            Workflow::Coordination => "👥 Live Care Coordination Monitor",
        }
    }

    pub fn batch_done_caption(self) -> &'static str {
        match self {
            Workflow::Verification => "✅ All Verified",
            Workflow::Followup => "✅ All Resolved",
            Workflow::Coordination => "✅ All Coordinated",
        }
    }

    pub fn batch_idle_caption(self) -> &'static str {
        match self {
            Workflow::Verification => "🎯 Verify All Visible",
            Workflow::Followup => "🔄 Follow-up All Visible",
            Workflow::Coordination => "🎯 Coordinate All Visible",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Workflow::Verification => "verification",
            Workflow::Followup => "follow-up",
            Workflow::Coordination => "coordination",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub label: String,
    pub icon: &'static str,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verification_status: String,
    pub patient_name: String,
    #[serde(default)]
    pub insurance_active: Option<bool>,
    #[serde(default)]
    pub coverage_type: Option<String>,
    #[serde(default)]
    pub copay: Option<String>,
    #[serde(default)]
    pub deductible_remaining: Option<String>,
    #[serde(default)]
    pub prior_auth_required: Option<bool>,
    #[serde(default)]
    pub effective_date: Option<String>,
    pub call_duration: String,
    pub confidence_score: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub recommended_action: Option<String>,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        self.verification_status == "success"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupResult {
    pub claim_number: String,
    pub patient_name: String,
    pub original_status: String,
    pub new_status: String,
    pub action_taken: String,
    pub expected_resolution: String,
    pub processing_time: String,
    pub confidence_score: u32,
    pub recovery_amount: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    Phone,
    Email,
    Mail,
}

impl ContactMethod {
    pub fn display(self) -> &'static str {
        match self {
            ContactMethod::Phone => "📞 Phone",
            ContactMethod::Email => "📧 Email",
            ContactMethod::Mail => "📮 Mail",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationResult {
    pub patient_name: String,
    pub task_type: String,
    pub contact_method: ContactMethod,
    pub contact_successful: bool,
    pub action_completed: String,
    pub next_step: String,
    #[serde(default)]
    pub expected_response: Option<String>,
    pub processing_time: String,
    pub confidence_score: u32,
    #[serde(default)]
    pub patient_satisfaction: Option<String>,
}

/// Result record returned by the backend; displayed, never computed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutcome {
    Verification(VerificationResult),
    Followup(FollowupResult),
    Coordination(CoordinationResult),
}

impl TaskOutcome {
    /// Whether the card should land in its success variant.
    pub fn is_success(&self) -> bool {
        match self {
            TaskOutcome::Verification(v) => v.is_success(),
            TaskOutcome::Followup(_) => true,
            TaskOutcome::Coordination(c) => c.contact_successful,
        }
    }
}

/// Decoded backend response for one task.
#[derive(Debug, Clone)]
pub struct TaskResponse {
    pub steps: Vec<String>,
    pub outcome: TaskOutcome,
    pub timestamp: Option<String>,
}

/// State changes published by the engine and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    TaskStarted {
        workflow: Workflow,
        entity_id: u64,
        label: String,
    },
    Step {
        workflow: Workflow,
        entity_id: u64,
        /// Number of steps in the run.
        total: usize,
        record: StepRecord,
    },
    TaskCompleted {
        workflow: Workflow,
        entity_id: u64,
        // Box to keep TaskEvent small; outcomes carry a dozen strings.
        outcome: Box<TaskOutcome>,
    },
    TaskCancelled {
        workflow: Workflow,
        entity_id: u64,
    },
    TaskFailed {
        workflow: Workflow,
        entity_id: u64,
        reason: String,
    },
    BatchStarted {
        workflow: Workflow,
        total: usize,
    },
    BatchFinished {
        workflow: Workflow,
        processed: usize,
        stopped: bool,
    },
    StopRequested,
    Notice(Notice),
}

/// User-visible notices (the blocking alerts of the dashboard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    AlreadyRunning,
    NothingPending(Workflow),
    TaskFailed(Workflow),
    UnknownEntity { workflow: Workflow, entity_id: u64 },
    Message(String),
}

impl Notice {
    pub fn to_message(&self) -> String {
        match self {
            Notice::AlreadyRunning => {
                "Process already running. Use stop button to cancel.".to_string()
            }
            Notice::NothingPending(Workflow::Verification) => {
                "No visible patients pending verification!".to_string()
            }
            Notice::NothingPending(Workflow::Followup) => {
                "No visible claims need follow-up!".to_string()
            }
            Notice::NothingPending(Workflow::Coordination) => {
                "No visible tasks pending coordination!".to_string()
            }
            Notice::TaskFailed(workflow) => format!(
                "Error occurred during {}. Please try again.",
                workflow.label()
            ),
            Notice::UnknownEntity {
                workflow,
                entity_id,
            } => format!("No {} entry with id {entity_id}", workflow.label()),
            Notice::Message(msg) => msg.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskReport {
    Completed { outcome: TaskOutcome },
    Cancelled,
    Failed { reason: String },
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity_id: u64,
    #[serde(flatten)]
    pub report: TaskReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub workflow: Workflow,
    pub entries: Vec<EntityReport>,
    pub stopped: bool,
    pub rejected: bool,
}

impl BatchReport {
    pub fn rejected(workflow: Workflow) -> Self {
        Self {
            workflow,
            entries: Vec::new(),
            stopped: false,
            rejected: true,
        }
    }
}

/// What text/JSON modes print and export.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp_utc: String,
    pub base_url: String,
    pub workflow: Workflow,
    pub stopped: bool,
    pub entries: Vec<EntityReport>,
}
