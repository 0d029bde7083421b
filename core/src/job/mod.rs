//! Units of work started by triggers
//!
//! A job runs against the shared connection, may react to connection events
//! while it is registered, and must signal completion exactly once through its
//! [`JobCompleter`]. Completion is a per-job oneshot channel that the registry
//! awaits; the completer is consumed on use and signals failure when dropped
//! unused, so a job that errors out or panics is still removed.

pub mod lnurl;
pub mod swap;

pub use lnurl::{LnurlPayInfoJob, LnurlPayInvoiceJob};
pub use swap::{swap_id_hash, SwapUpdatedJob};

use crate::config::LnurlConfig;
use crate::connection::Connection;
use crate::platform::PlatformBridge;
use crate::sdk::{SdkError, SdkEvent};
use crate::trigger::Trigger;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("SDK error: {0}")]
    Sdk(#[from] SdkError),

    #[error("Reply failed: {0}")]
    Reply(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// ============================================================================
// IDENTITY & STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    SwapUpdated,
    LnurlPayInfo,
    LnurlPayInvoice,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwapUpdated => write!(f, "SwapUpdated"),
            Self::LnurlPayInfo => write!(f, "LnurlPayInfo"),
            Self::LnurlPayInvoice => write!(f, "LnurlPayInvoice"),
        }
    }
}

/// Pending -> Running -> Completed | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn final_state(&self) -> JobState {
        match self {
            Self::Completed => JobState::Completed,
            Self::Failed(_) => JobState::Failed,
        }
    }
}

impl From<&Result<(), JobError>> for JobOutcome {
    fn from(result: &Result<(), JobError>) -> Self {
        match result {
            Ok(()) => Self::Completed,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

// ============================================================================
// COMPLETION
// ============================================================================

/// One-shot completion signal owned by a running job
pub struct JobCompleter {
    id: JobId,
    tx: Option<oneshot::Sender<JobOutcome>>,
}

impl JobCompleter {
    pub fn new(id: JobId) -> (Self, oneshot::Receiver<JobOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { id, tx: Some(tx) }, rx)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn complete(mut self, outcome: JobOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for JobCompleter {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            debug!("Job {} dropped its completer without completing", self.id);
            let _ = tx.send(JobOutcome::Failed(
                "dropped without completing".to_string(),
            ));
        }
    }
}

impl fmt::Debug for JobCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCompleter")
            .field("id", &self.id)
            .field("pending", &self.tx.is_some())
            .finish()
    }
}

// ============================================================================
// JOB TRAIT
// ============================================================================

/// What a job gets to work with
#[derive(Clone)]
pub struct JobContext {
    pub connection: Connection,
    pub bridge: Arc<dyn PlatformBridge>,
    pub lnurl: LnurlConfig,
}

#[async_trait]
pub trait Job: Send + Sync {
    fn id(&self) -> JobId;

    fn kind(&self) -> JobKind;

    /// Run the job body. Completion is signalled through `completer`, which
    /// may outlive this call (event-driven jobs keep it until the event
    /// they wait for arrives).
    async fn start(&self, ctx: JobContext, completer: JobCompleter) -> Result<(), JobError>;

    /// Connection event, delivered while the job is registered. Must not block.
    fn on_event(&self, event: &SdkEvent);

    /// Cooperative cancellation from the hard service timeout.
    fn on_shutdown(&self);
}

/// The one place trigger kinds are matched to job implementations.
pub fn build_job(trigger: Trigger) -> Arc<dyn Job> {
    match trigger {
        Trigger::SwapUpdated(request) => Arc::new(SwapUpdatedJob::new(request)),
        Trigger::LnurlPayInfo(request) => Arc::new(LnurlPayInfoJob::new(request)),
        Trigger::LnurlPayInvoice(request) => Arc::new(LnurlPayInvoiceJob::new(request)),
    }
}
