use async_trait::async_trait;
use scout_model::{CapabilityStatus, Job, JobResult, WorkerCapabilities};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Who is answering, as reported on `/healthz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub platform: String,
    pub arch: String,
}

impl WorkerIdentity {
    pub fn current() -> Self {
        Self {
            worker_id: scout_core::worker_id().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: scout_core::uptime_seconds(),
            platform: scout_core::platform().to_string(),
            arch: scout_core::arch().to_string(),
        }
    }
}

/// Worker API backend.
///
/// Implemented by [`crate::WorkerApiAdapter`]; custom handlers can wrap it to
/// add authentication or admission control.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Current capability advertisement.
    async fn capabilities(&self) -> Result<WorkerCapabilities, ApiError>;

    /// Every tracked capability status, sorted by name.
    async fn health(&self) -> Result<Vec<CapabilityStatus>, ApiError>;

    /// Run a job to completion.
    async fn execute(&self, job: Job) -> Result<JobResult, ApiError>;

    fn identity(&self) -> WorkerIdentity {
        WorkerIdentity::current()
    }
}
