use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{Page, accumulate};
use scout_model::{AuthMode, Job, JobType};
use serde_json::Value;
use tracing::instrument;

use super::{ExecContext, Strategy};
use crate::{
    actor::{ActorRoutes, ActorRunner},
    error::{ExecError, ExecResult},
};

/// Jobs served by actors on the managed platform, one run per page.
pub struct ActorStrategy {
    runner: Arc<ActorRunner>,
    routes: Arc<ActorRoutes>,
}

impl ActorStrategy {
    pub fn new(runner: Arc<ActorRunner>, routes: Arc<ActorRoutes>) -> Self {
        Self { runner, routes }
    }
}

#[async_trait]
impl Strategy for ActorStrategy {
    fn name(&self) -> &'static str {
        "actor"
    }

    fn supports(&self, job_type: JobType) -> bool {
        job_type.auth_mode() == AuthMode::Actor
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job.id, capability = %job.arguments.capability))]
    async fn execute(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>> {
        let args = &job.arguments;
        let route = self.routes.get(job.job_type, &args.capability).ok_or_else(|| {
            ExecError::Unsupported(format!("no actor for {}/{}", job.job_type, args.capability))
        })?;

        let target = ctx.retry.target(args.max_results);
        accumulate(target, args.next_cursor.clone(), ctx.deadline, |count, cursor| async move {
            let limit = self.runner.page_limit(count);
            let input = route.build_input(args, cursor.offset() + limit as u64);
            self.runner
                .run::<Value>(&ctx.cancel, &route.actor_id, &input, &cursor, limit)
                .await
        })
        .await
    }
}
