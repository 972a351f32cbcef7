use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use async_trait::async_trait;
use scout_core::{Subscribe, WorkerEvent};

const DURATION_BUCKETS: [f64; 10] = [0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Worker metrics on a dedicated registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    capability_healthy: GaugeVec,
    capability_errors: GaugeVec,
    cooldowns: IntCounter,
    actor_runs: IntCounterVec,
    jobs: IntCounterVec,
    job_duration: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let capability_healthy = GaugeVec::new(
            Opts::new("scout_capability_healthy", "Capability health (1 healthy, 0 unhealthy)"),
            &["capability"],
        )?;
        let capability_errors = GaugeVec::new(
            Opts::new("scout_capability_errors", "Consecutive failed checks per capability"),
            &["capability"],
        )?;
        let cooldowns = IntCounter::new(
            "scout_credential_cooldowns_total",
            "Accounts taken out of rotation after a rate limit",
        )?;
        let actor_runs = IntCounterVec::new(
            Opts::new("scout_actor_runs_total", "Actor runs by final outcome"),
            &["outcome"],
        )?;
        let jobs = IntCounterVec::new(
            Opts::new("scout_jobs_total", "Executed jobs by type and outcome"),
            &["job_type", "outcome"],
        )?;
        let job_duration = HistogramVec::new(
            HistogramOpts::new("scout_job_duration_seconds", "Job wall-clock duration")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["job_type"],
        )?;

        registry.register(Box::new(capability_healthy.clone()))?;
        registry.register(Box::new(capability_errors.clone()))?;
        registry.register(Box::new(cooldowns.clone()))?;
        registry.register(Box::new(actor_runs.clone()))?;
        registry.register(Box::new(jobs.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;

        Ok(Self {
            registry,
            capability_healthy,
            capability_errors,
            cooldowns,
            actor_runs,
            jobs,
            job_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format, as served on `/metrics`.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[async_trait]
impl Subscribe for PrometheusMetrics {
    async fn on_event(&self, event: &WorkerEvent) {
        match event {
            WorkerEvent::CapabilityChecked {
                capability,
                healthy,
                error_count,
                ..
            } => {
                let healthy = if *healthy { 1.0 } else { 0.0 };
                self.capability_healthy
                    .with_label_values(&[capability.as_str()])
                    .set(healthy);
                self.capability_errors
                    .with_label_values(&[capability.as_str()])
                    .set(f64::from(*error_count));
            }
            // gauges already follow CapabilityChecked
            WorkerEvent::CapabilityRecovered { capability } => {
                self.capability_healthy
                    .with_label_values(&[capability.as_str()])
                    .set(1.0);
            }
            WorkerEvent::CapabilityDegraded { .. } => {}
            WorkerEvent::CredentialCooledDown { .. } => self.cooldowns.inc(),
            WorkerEvent::ActorRunFinished { outcome, .. } => {
                self.actor_runs.with_label_values(&[outcome.as_str()]).inc();
            }
            WorkerEvent::JobFinished {
                job_type,
                ok,
                elapsed,
                ..
            } => {
                let outcome = if *ok { "ok" } else { "error" };
                self.jobs
                    .with_label_values(&[job_type.as_str(), outcome])
                    .inc();
                self.job_duration
                    .with_label_values(&[job_type.as_str()])
                    .observe(elapsed.as_secs_f64());
            }
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn queue_capacity(&self) -> usize {
        4096
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn metrics() -> PrometheusMetrics {
        PrometheusMetrics::new().unwrap()
    }

    #[tokio::test]
    async fn capability_checks_drive_gauges() {
        let m = metrics();
        m.on_event(&WorkerEvent::CapabilityChecked {
            capability: "twitter/searchbyquery".into(),
            healthy: false,
            error_count: 3,
            error: Some("boom".into()),
        }).await;

        let healthy = m.capability_healthy.with_label_values(&["twitter/searchbyquery"]).get();
        let errors = m.capability_errors.with_label_values(&["twitter/searchbyquery"]).get();
        assert_eq!(healthy, 0.0);
        assert_eq!(errors, 3.0);
    }

    #[tokio::test]
    async fn jobs_are_counted_and_timed() {
        let m = metrics();
        for ok in [true, true, false] {
            m.on_event(&WorkerEvent::JobFinished {
                job_type: "reddit".into(),
                ok,
                items: 1,
                elapsed: Duration::from_millis(1500),
            }).await;
        }

        assert_eq!(m.jobs.with_label_values(&["reddit", "ok"]).get(), 2);
        assert_eq!(m.jobs.with_label_values(&["reddit", "error"]).get(), 1);
        assert_eq!(m.job_duration.with_label_values(&["reddit"]).get_sample_count(), 3);
    }

    #[tokio::test]
    async fn cooldowns_and_actor_runs() {
        let m = metrics();
        m.on_event(&WorkerEvent::CredentialCooledDown {
            username: "u".into(),
            cooldown: Duration::from_secs(900),
        }).await;
        m.on_event(&WorkerEvent::ActorRunFinished {
            actor: "a".into(),
            run_id: "r".into(),
            outcome: "failed".into(),
            polls: 2,
        }).await;

        assert_eq!(m.cooldowns.get(), 1);
        assert_eq!(m.actor_runs.with_label_values(&["failed"]).get(), 1);

        let text = m.render().unwrap();
        assert!(text.contains("scout_credential_cooldowns_total 1"));
        assert!(text.contains("scout_actor_runs_total{outcome=\"failed\"} 1"));
    }

    #[test]
    fn shared_registry_rejects_duplicates() {
        let registry = Registry::new();
        PrometheusMetrics::with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::with_registry(registry).is_err());
    }
}
