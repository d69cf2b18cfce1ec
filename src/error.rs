//! Engine error taxonomy.
//!
//! `StoppedByUser` is an expected outcome and never surfaces as a failure.
//! Transport, status and decode errors are the network/server failures that
//! get logged and reported. The remaining variants are precondition
//! violations rejected before any state is touched.

use crate::model::Workflow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("process stopped by user")]
    StoppedByUser,

    #[error("request to backend failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("a process is already running")]
    AlreadyRunning,

    #[error("nothing pending for {}", .0.label())]
    NothingPending(Workflow),

    #[error("unknown {} entity {entity_id}", workflow.label())]
    UnknownEntity { workflow: Workflow, entity_id: u64 },
}

impl EngineError {
    pub fn is_stop(&self) -> bool {
        matches!(self, EngineError::StoppedByUser)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
