use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{CapabilitySource, CredentialPool, Page, arch, platform, uptime_seconds, worker_id};
use scout_model::{AuthMode, Job, JobType};
use serde_json::{Value, json};

use super::{ExecContext, Strategy};
use crate::error::ExecResult;

/// Worker self-report: identity, uptime, credential inventory and the
/// current capability advertisement.
pub struct TelemetryStrategy {
    pool: Arc<CredentialPool>,
    source: CapabilitySource,
}

impl TelemetryStrategy {
    pub fn new(pool: Arc<CredentialPool>, source: CapabilitySource) -> Self {
        Self { pool, source }
    }
}

#[async_trait]
impl Strategy for TelemetryStrategy {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn supports(&self, job_type: JobType) -> bool {
        job_type.auth_mode() == AuthMode::None
    }

    async fn execute(&self, _job: &Job, _ctx: &ExecContext) -> ExecResult<Page<Value>> {
        let report = json!({
            "workerId": worker_id(),
            "uptimeSeconds": uptime_seconds(),
            "platform": platform(),
            "arch": arch(),
            "accounts": self.pool.account_count(),
            "availableAccounts": self.pool.available_accounts(),
            "apiKeys": self.pool.key_count(),
            "capabilities": self.source.worker_capabilities().await,
        });
        Ok(Page::last(vec![report]))
    }
}
