use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use scout_model::{CapabilityStatus, Job, JobResult, WorkerCapabilities};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    handler::{ApiHandler, WorkerIdentity},
};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build the axum router.
    ///
    /// Routes:
    /// - GET /healthz - liveness and worker identity
    /// - GET /readyz - 200 once any capability is advertised, 503 before
    /// - GET /api/v1/capabilities - capability advertisement
    /// - GET /api/v1/health - capability statuses
    /// - POST /api/v1/jobs - execute a job
    pub fn router(self) -> Router {
        Router::new()
            .route("/healthz", get(healthz::<H>))
            .route("/readyz", get(readyz::<H>))
            .route("/api/v1/capabilities", get(capabilities::<H>))
            .route("/api/v1/health", get(health::<H>))
            .route("/api/v1/jobs", post(execute::<H>))
            .with_state(self.handler)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthzResponse {
    status: String,
    #[serde(flatten)]
    identity: WorkerIdentity,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReadyzResponse {
    ready: bool,
    capabilities: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    statuses: Vec<CapabilityStatus>,
}

/// GET /healthz
async fn healthz<H: ApiHandler>(State(handler): State<Arc<H>>) -> impl IntoResponse {
    Json(HealthzResponse {
        status: "ok".into(),
        identity: handler.identity(),
    })
}

/// GET /readyz
async fn readyz<H: ApiHandler>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError> {
    let count = handler.capabilities().await?.keys().len();
    let status = if count > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((
        status,
        Json(ReadyzResponse {
            ready: count > 0,
            capabilities: count,
        }),
    ))
}

/// GET /api/v1/capabilities
async fn capabilities<H: ApiHandler>(
    State(handler): State<Arc<H>>,
) -> Result<Json<WorkerCapabilities>, ApiError> {
    Ok(Json(handler.capabilities().await?))
}

/// GET /api/v1/health
async fn health<H: ApiHandler>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(HealthResponse {
        statuses: handler.health().await?,
    }))
}

/// POST /api/v1/jobs
async fn execute<H: ApiHandler>(
    State(handler): State<Arc<H>>,
    Json(job): Json<Job>,
) -> Result<Json<JobResult>, ApiError> {
    Ok(Json(handler.execute(job).await?))
}
