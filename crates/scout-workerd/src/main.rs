mod config;

use std::sync::Arc;

use scout_api::{
    HttpApi, WorkerApiAdapter,
    axum::{
        self, Router,
        extract::State,
        http::{StatusCode, header},
        response::{IntoResponse, Response},
        routing::get,
    },
};
use scout_core::{
    ActorProbe, CapabilityCatalog, CapabilityDetector, CapabilitySource, CredentialPool, EventBus,
    HealthTracker, Reconciler, Subscribe, Verifier,
};
use scout_exec::{
    ActorRoutes, ActorRunner, ActorStrategy, ApifyClient, BestAvailableStrategy,
    CredentialStrategy, DirectClient, HttpKeyClassifier, KeyStrategy, RestClient, StrategyRouter,
    TelemetryStrategy, classify_keys, register_checks,
};
use scout_observe::{Journal, logger_init};
use scout_prometheus::PrometheusMetrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Config + logger
    let cfg = WorkerConfig::from_env()?;
    logger_init(&cfg.logger)?;
    scout_core::init_uptime();
    info!(config = ?cfg, worker_id = %scout_core::worker_id(), "scout worker starting");

    // 2) Event fan-out
    let metrics = Arc::new(PrometheusMetrics::new()?);
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![
        Arc::new(Journal::new()),
        metrics.clone() as Arc<dyn Subscribe>,
    ];
    let events = EventBus::new(subscribers);
    let shutdown = CancellationToken::new();

    // 3) Credentials
    let http = reqwest::Client::new();
    let tracker = HealthTracker::new().with_events(events.clone());
    let pool = Arc::new(
        CredentialPool::new(cfg.accounts.clone(), cfg.api_keys.clone(), &cfg.pool)
            .with_events(events.clone()),
    );
    if pool.key_count() > 0 {
        let classifier = HttpKeyClassifier::new(http.clone(), &cfg.classify_url)?;
        let classified = classify_keys(&pool, &classifier).await;
        info!(classified, total = pool.key_count(), "api keys classified");
    }
    info!(
        accounts = pool.account_count(),
        keys = pool.key_count(),
        "credential pool ready"
    );

    // 4) Actor platform (optional)
    let routes = Arc::new(ActorRoutes::standard());
    let runner = cfg.actor_token.as_ref().map(|token| {
        let platform = Arc::new(ApifyClient::with_client(
            http.clone(),
            cfg.actor_base_url.clone(),
            token.clone(),
        ));
        Arc::new(ActorRunner::new(platform, cfg.actor.clone()).with_events(events.clone()))
    });
    let probe = runner.clone().map(|r| r as Arc<dyn ActorProbe>);
    if probe.is_none() {
        info!("no actor token configured; actor capabilities disabled");
    }

    // 5) Detection + verification
    let direct: Arc<dyn DirectClient> =
        Arc::new(RestClient::new(http.clone(), cfg.direct_base_url.clone()));
    let mut catalog = CapabilityCatalog::default();
    if probe.is_some() {
        catalog = catalog.with_actor_gates(routes.gates());
    }
    let mut detector = CapabilityDetector::new(pool.clone(), tracker.clone(), catalog);
    if let Some(probe) = &probe {
        detector = detector.with_probe(probe.clone());
    }
    let detector = Arc::new(detector);

    let verifier = Arc::new(Verifier::new(tracker.clone(), cfg.health.verify_timeout));
    let checks = register_checks(&verifier, &detector, pool.clone(), direct.clone(), probe.clone());
    let healthy = verifier.verify_all().await;
    info!(checks, healthy, "initial capability verification done");

    let advertised = detector.detect().await;
    info!(capabilities = advertised.keys().len(), "capabilities detected");

    let reconciler = Reconciler::new(verifier.clone(), cfg.health.clone()).spawn(shutdown.child_token());

    // 6) Strategies
    let source = CapabilitySource::Live(detector.clone());

    let mut router = StrategyRouter::new(cfg.job_timeout)
        .with_events(events.clone())
        .with_tracker(tracker.clone())
        .with_retry(cfg.retry.clone());
    router.register(Arc::new(TelemetryStrategy::new(pool.clone(), source.clone())));
    router.register(Arc::new(CredentialStrategy::new(pool.clone(), direct.clone())));
    router.register(Arc::new(KeyStrategy::new(pool.clone(), direct.clone())));
    router.register(Arc::new(BestAvailableStrategy::new(pool.clone(), direct)));
    if let Some(runner) = &runner {
        router.register(Arc::new(ActorStrategy::new(runner.clone(), routes.clone())));
    }
    let router = Arc::new(router);

    // 7) HTTP surface
    let adapter = WorkerApiAdapter::new(source, tracker, router, shutdown.clone());
    let app = HttpApi::new(Arc::new(adapter))
        .router()
        .merge(metrics_router(metrics));

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            info!("shutting down...");
            token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = reconciler.await {
        warn!(error = %e, "reconciler task ended abnormally");
    }
    info!("scout worker stopped");
    Ok(())
}

fn metrics_router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

/// GET /metrics
async fn render_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => {
            warn!(error = %e, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
