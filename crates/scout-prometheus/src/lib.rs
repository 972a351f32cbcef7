//! Prometheus metrics for the scout worker.
//!
//! [`PrometheusMetrics`] is a [`scout_core::Subscribe`] implementation: hand
//! it to the [`scout_core::EventBus`] and it turns worker events into metrics.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use scout_core::{EventBus, Subscribe, WorkerEvent};
//! use scout_prometheus::PrometheusMetrics;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! let bus = EventBus::new(vec![metrics.clone() as Arc<dyn Subscribe>]);
//!
//! bus.publish(WorkerEvent::CapabilityRecovered { capability: "reddit/searchposts".into() });
//! // delivery happens on the subscriber's own task
//! while !metrics.render()?.contains("scout_capability_healthy") {
//!     tokio::task::yield_now().await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `scout_capability_healthy{capability}` - Gauge (1 healthy, 0 unhealthy)
//! - `scout_capability_errors{capability}` - Gauge (consecutive failures)
//! - `scout_credential_cooldowns_total` - Counter
//! - `scout_actor_runs_total{outcome}` - Counter
//! - `scout_jobs_total{job_type, outcome}` - Counter
//! - `scout_job_duration_seconds{job_type}` - Histogram
//!
//! ## HTTP Server
//! This crate does not serve `/metrics`; the daemon mounts [`PrometheusMetrics::render`]
//! on its HTTP router.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
