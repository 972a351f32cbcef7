use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{CapabilitySource, HealthTracker};
use scout_exec::StrategyRouter;
use scout_model::{CapabilityStatus, Job, JobResult, WorkerCapabilities};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{error::ApiError, handler::ApiHandler};

/// [`ApiHandler`] over the worker's capability source, tracker and router.
///
/// Jobs are only accepted for capabilities currently advertised.
pub struct WorkerApiAdapter {
    source: CapabilitySource,
    tracker: HealthTracker,
    router: Arc<StrategyRouter>,
    shutdown: CancellationToken,
}

impl WorkerApiAdapter {
    pub fn new(
        source: CapabilitySource,
        tracker: HealthTracker,
        router: Arc<StrategyRouter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            tracker,
            router,
            shutdown,
        }
    }
}

#[async_trait]
impl ApiHandler for WorkerApiAdapter {
    async fn capabilities(&self) -> Result<WorkerCapabilities, ApiError> {
        Ok(self.source.worker_capabilities().await)
    }

    async fn health(&self) -> Result<Vec<CapabilityStatus>, ApiError> {
        let mut statuses: Vec<_> = self.tracker.get_all_statuses().into_values().collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(statuses)
    }

    #[instrument(level = "debug", skip_all, fields(job_type = %job.job_type))]
    async fn execute(&self, job: Job) -> Result<JobResult, ApiError> {
        let capability = job.arguments.capability.trim();
        if capability.is_empty() {
            return Err(ApiError::InvalidRequest("arguments.type is required".into()));
        }

        let job_type = job.job_type.as_str();
        if !self.source.worker_capabilities().await.contains(job_type, capability) {
            return Err(ApiError::CapabilityUnavailable {
                job_type: job_type.to_string(),
                capability: capability.to_string(),
            });
        }

        debug!(capability, "job accepted");
        Ok(self.router.execute(&job, self.shutdown.child_token()).await)
    }
}
