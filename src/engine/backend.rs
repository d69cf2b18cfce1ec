use crate::error::{EngineError, EngineResult};
use crate::model::{RunConfig, TaskOutcome, TaskResponse, Workflow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

const STOP_PATH: &str = "/api/stop-process";

/// The office backend that performs verification, follow-up and coordination.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run one task for `entity_id`; exactly one request per call.
    async fn dispatch(&self, workflow: Workflow, entity_id: u64) -> EngineResult<TaskResponse>;

    /// Tell the backend to stop whatever it is processing.
    async fn stop(&self) -> EngineResult<()>;
}

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(cfg: &RunConfig) -> EngineResult<Self> {
        // No request timeout: a hung backend call hangs the task.
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn dispatch(&self, workflow: Workflow, entity_id: u64) -> EngineResult<TaskResponse> {
        let mut body = serde_json::Map::new();
        body.insert(workflow.id_field().to_string(), Value::from(entity_id));

        let resp = self
            .http
            .post(self.url(workflow.endpoint()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(EngineError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        decode_response(workflow, &value)
    }

    async fn stop(&self) -> EngineResult<()> {
        self.http
            .post(self.url(STOP_PATH))
            .json(&serde_json::json!({}))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct StepEntry {
    step: String,
}

/// Decode a task response body for `workflow`.
pub fn decode_response(workflow: Workflow, value: &Value) -> EngineResult<TaskResponse> {
    let steps_raw = value
        .get(workflow.steps_field())
        .ok_or_else(|| EngineError::Decode(format!("missing `{}`", workflow.steps_field())))?;
    let steps: Vec<StepEntry> = serde_json::from_value(steps_raw.clone())
        .map_err(|e| EngineError::Decode(format!("{}: {e}", workflow.steps_field())))?;

    let result_raw = value
        .get(workflow.result_field())
        .cloned()
        .ok_or_else(|| EngineError::Decode(format!("missing `{}`", workflow.result_field())))?;
    let decode_err = |e: serde_json::Error| EngineError::Decode(format!("{}: {e}", workflow.result_field()));
    let outcome = match workflow {
        Workflow::Verification => {
            TaskOutcome::Verification(serde_json::from_value(result_raw).map_err(decode_err)?)
        }
        Workflow::Followup => {
            TaskOutcome::Followup(serde_json::from_value(result_raw).map_err(decode_err)?)
        }
        Workflow::Coordination => {
            TaskOutcome::Coordination(serde_json::from_value(result_raw).map_err(decode_err)?)
        }
    };

    Ok(TaskResponse {
        steps: steps.into_iter().map(|s| s.step).collect(),
        outcome,
        timestamp: value
            .get("timestamp")
            .and_then(|t| t.as_str())
            .map(String::from),
    })
}
