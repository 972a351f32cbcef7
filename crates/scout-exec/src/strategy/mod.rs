//! Job execution strategies and the router that dispatches jobs to them by
//! authentication mode.

mod actor;
mod direct;
mod rotation;
mod telemetry;

pub use actor::ActorStrategy;
pub use direct::{BestAvailableStrategy, CredentialStrategy, KeyStrategy, key_accepts, key_usable};
pub use rotation::{with_account, with_key};
pub use telemetry::TelemetryStrategy;

use std::{
    sync::Arc,
    time::{Duration, Instant as StdInstant},
};

use async_trait::async_trait;
use scout_core::{EventBus, HealthTracker, Page, RetryConfig, WorkerEvent};
use scout_model::{Job, JobResult, JobType, capability_key};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{ExecError, ExecResult};

/// Per-job execution bounds.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Checked between pages; a page already in flight is not interrupted.
    pub deadline: Instant,
    pub cancel: CancellationToken,
    pub retry: RetryConfig,
}

impl ExecContext {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// One way of executing jobs.
#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn supports(&self, job_type: JobType) -> bool;

    async fn execute(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>>;
}

/// Picks the first registered strategy supporting a job's type.
///
/// With a tracker attached, a job that fails because its execution path is
/// unusable marks the job's capability unhealthy. The reconciler brings it
/// back once its check passes again.
pub struct StrategyRouter {
    strategies: Vec<Arc<dyn Strategy>>,
    default_timeout: Duration,
    events: EventBus,
    tracker: Option<HealthTracker>,
    retry: RetryConfig,
}

impl StrategyRouter {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            default_timeout,
            events: EventBus::default(),
            tracker: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_tracker(mut self, tracker: HealthTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        trace!(strategy = strategy.name(), "strategy registered");
        self.strategies.push(strategy);
    }

    pub fn pick(&self, job_type: JobType) -> Option<&Arc<dyn Strategy>> {
        self.strategies.iter().find(|s| s.supports(job_type))
    }

    /// Job types some registered strategy can run.
    pub fn job_types(&self) -> Vec<JobType> {
        JobType::ALL
            .into_iter()
            .filter(|t| self.pick(*t).is_some())
            .collect()
    }

    /// Execute `job` and return its items.
    #[instrument(level = "debug", skip(self, job, cancel), fields(job_id = %job.id, job_type = %job.job_type))]
    pub async fn run(&self, job: &Job, cancel: CancellationToken) -> ExecResult<Page<Value>> {
        let strategy = self
            .pick(job.job_type)
            .ok_or_else(|| ExecError::Unsupported(format!("job type {}", job.job_type)))?;

        let timeout = job
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        let ctx = ExecContext::new(timeout, cancel).with_retry(self.retry.clone());
        debug!(strategy = strategy.name(), ?timeout, "dispatching job");

        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(ExecError::Cancelled),
            res = strategy.execute(job, &ctx) => res,
        }
    }

    /// Execute `job` and wrap the outcome in the result envelope.
    ///
    /// The envelope carries either data or an error, never both.
    pub async fn execute(&self, job: &Job, cancel: CancellationToken) -> JobResult {
        let started = StdInstant::now();
        let outcome = self.run(job, cancel).await.and_then(|page| {
            let count = page.items.len();
            let data = serde_json::to_vec(&page.items)?;
            Ok((data, page.next_cursor, count))
        });
        let elapsed = started.elapsed();

        let (result, ok, items) = match outcome {
            Ok((data, cursor, count)) => {
                info!(job_id = %job.id, job_type = %job.job_type, items = count, ?elapsed, "job finished");
                (JobResult::ok(data, cursor), true, count)
            }
            Err(e) => {
                warn!(job_id = %job.id, job_type = %job.job_type, error = %e, ?elapsed, "job failed");
                self.downgrade(job, &e);
                (JobResult::failed(e.to_string()), false, 0)
            }
        };

        self.events.publish(WorkerEvent::JobFinished {
            job_type: job.job_type.to_string(),
            ok,
            items,
            elapsed,
        });
        result
    }

    /// Only capabilities the tracker already knows are touched; job
    /// arguments never create new entries.
    fn downgrade(&self, job: &Job, err: &ExecError) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        if !err.indicts_path() {
            return;
        }
        let key = capability_key(job.job_type.as_str(), &job.arguments.capability);
        if tracker.get_status(&key).is_some_and(|s| s.is_healthy) {
            debug!(capability = %key, "job failure marks capability unhealthy");
            let msg = err.to_string();
            tracker.update_status(&key, false, Some(msg.as_str()));
        }
    }
}
