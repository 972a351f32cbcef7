//! Capability verification with timeout and panic isolation.

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};
use tracing::{debug, instrument, warn};

use crate::{error::CoreError, health::HealthTracker};

/// Outcome of a check: `Ok(true)` healthy, `Ok(false)` unhealthy without a
/// specific error, `Err` unhealthy with the error recorded.
pub type CheckResult = Result<bool, Box<dyn std::error::Error + Send + Sync>>;

/// A registered capability check.
///
/// Checks run on their own task under a timeout; the token is cancelled
/// when the timeout elapses, so a check must not assume it runs to completion.
#[async_trait]
pub trait Check: Send + Sync + 'static {
    async fn check(&self, ctx: CancellationToken) -> CheckResult;
}

/// Adapter turning an async closure into a [`Check`].
pub struct FnCheck<F>(F);

impl<F> FnCheck<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Check for FnCheck<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult> + Send + 'static,
{
    async fn check(&self, ctx: CancellationToken) -> CheckResult {
        (self.0)(ctx).await
    }
}

/// Runs registered checks and records exactly one status per invocation.
pub struct Verifier {
    checks: RwLock<HashMap<String, Arc<dyn Check>>>,
    tracker: HealthTracker,
    timeout: Duration,
}

impl Verifier {
    pub fn new(tracker: HealthTracker, timeout: Duration) -> Self {
        Self {
            checks: RwLock::new(HashMap::new()),
            tracker,
            timeout,
        }
    }

    pub fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }

    /// Register (or replace) the check for a capability.
    pub fn register(&self, name: impl Into<String>, check: Arc<dyn Check>) {
        let name = name.into();
        debug!(capability = %name, "verifier registered");
        self.checks.write().insert(name, check);
    }

    pub fn register_fn<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckResult> + Send + 'static,
    {
        self.register(name, Arc::new(FnCheck::new(f)));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.checks.write().remove(name).is_some()
    }

    pub fn has_check(&self, name: &str) -> bool {
        self.checks.read().contains_key(name)
    }

    /// Names with a registered check, sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<_> = self.checks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Verify one capability and record the result; returns its health.
    ///
    /// A capability without a check is recorded unhealthy: it cannot be
    /// proven, so it must not be advertised. Dropping the returned future
    /// aborts the check task and cancels its token.
    #[instrument(level = "debug", skip(self))]
    pub async fn verify(&self, name: &str) -> bool {
        let check = self.checks.read().get(name).cloned();
        let Some(check) = check else {
            let err = CoreError::NoVerifier(name.to_string()).to_string();
            self.tracker.update_status(name, false, Some(&err));
            return false;
        };

        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        let ctx = token.clone();
        let mut handle = AbortOnDropHandle::new(tokio::spawn(async move { check.check(ctx).await }));

        let (healthy, error) = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(healthy))) => (healthy, None),
            Ok(Ok(Err(e))) => (false, Some(e.to_string())),
            Ok(Err(join)) if join.is_panic() => {
                let msg = panic_message(join.into_panic());
                warn!(capability = name, panic = %msg, "capability check panicked");
                (false, Some(CoreError::CheckPanicked(msg).to_string()))
            }
            Ok(Err(join)) => (false, Some(CoreError::CheckAborted(join.to_string()).to_string())),
            Err(_) => {
                // late results are discarded with the task
                token.cancel();
                handle.abort();
                warn!(capability = name, timeout = ?self.timeout, "capability check timed out");
                (false, Some(CoreError::CheckTimeout(self.timeout).to_string()))
            }
        };

        self.tracker.update_status(name, healthy, error.as_deref());
        healthy
    }

    /// Verify every registered capability; returns how many are healthy.
    pub async fn verify_all(&self) -> usize {
        let mut healthy = 0;
        for name in self.registered() {
            if self.verify(&name).await {
                healthy += 1;
            }
        }
        healthy
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, testing::recording_bus};

    fn verifier() -> (Verifier, HealthTracker) {
        let tracker = HealthTracker::new();
        (Verifier::new(tracker.clone(), Duration::from_secs(30)), tracker)
    }

    #[tokio::test]
    async fn missing_verifier_is_unhealthy() {
        let (v, t) = verifier();
        assert!(!v.verify("web/scraper").await);

        let s = t.get_status("web/scraper").unwrap();
        assert!(!s.is_healthy);
        assert!(s.last_error.unwrap().contains("no verifier available"));
    }

    #[tokio::test]
    async fn healthy_check_is_recorded() {
        let (v, t) = verifier();
        v.register_fn("a", |_ctx| async { CheckResult::Ok(true) });
        assert!(v.verify("a").await);
        assert!(t.get_status("a").unwrap().is_healthy);
    }

    #[tokio::test]
    async fn failing_check_records_error() {
        let (v, t) = verifier();
        v.register_fn("a", |_ctx| async { CheckResult::Err("quota exceeded".into()) });
        assert!(!v.verify("a").await);

        let s = t.get_status("a").unwrap();
        assert_eq!(s.last_error.as_deref(), Some("quota exceeded"));
        assert_eq!(s.error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_check_times_out() {
        let (v, t) = verifier();
        v.register_fn("slow", |_ctx| std::future::pending::<CheckResult>());

        let started = tokio::time::Instant::now();
        assert!(!v.verify("slow").await);
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(31));
        let s = t.get_status("slow").unwrap();
        assert!(s.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_the_check_token() {
        let (v, _t) = verifier();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = parking_lot::Mutex::new(Some(tx));
        v.register_fn("slow", move |ctx: CancellationToken| {
            let tx = tx.lock().take();
            async move {
                ctx.cancelled().await;
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
                CheckResult::Ok(true)
            }
        });

        assert!(!v.verify("slow").await);
        // the check observed cancellation, or was aborted before it could report
        let _ = rx.await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_verification_aborts_its_check() {
        let (v, _t) = verifier();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = parking_lot::Mutex::new(Some(tx));
        v.register_fn("slow", move |_ctx| {
            let held = tx.lock().take();
            async move {
                let _held = held;
                std::future::pending::<CheckResult>().await
            }
        });

        // caller gives up long before the verifier's own timeout
        let outer = tokio::time::timeout(Duration::from_secs(1), v.verify("slow")).await;
        assert!(outer.is_err());

        // the sender lives only inside the check task, so it closes on abort
        let closed = tokio::time::timeout(Duration::from_secs(5), rx).await;
        assert!(matches!(closed, Ok(Err(_))), "check task still running");
    }

    #[tokio::test]
    async fn panicking_check_is_contained() {
        let (v, t) = verifier();
        v.register_fn("boom", |_ctx| async {
            if true {
                panic!("kaboom");
            }
            CheckResult::Ok(true)
        });

        assert!(!v.verify("boom").await);
        let err = t.get_status("boom").unwrap().last_error.unwrap();
        assert!(err.contains("kaboom"), "{err}");
    }

    #[tokio::test]
    async fn one_status_update_per_verify() {
        let (bus, rec) = recording_bus();
        let tracker = HealthTracker::new().with_events(bus);
        let v = Verifier::new(tracker, Duration::from_secs(30));
        v.register_fn("a", |_ctx| async { CheckResult::Ok(false) });

        v.verify("a").await;
        v.verify("missing").await;

        let checked = rec
            .wait_for(4)
            .await
            .into_iter()
            .filter(|k| *k == EventKind::CapabilityChecked)
            .count();
        assert_eq!(checked, 2);
    }

    #[tokio::test]
    async fn verify_all_counts_healthy() {
        let (v, _t) = verifier();
        v.register_fn("a", |_ctx| async { CheckResult::Ok(true) });
        v.register_fn("b", |_ctx| async { CheckResult::Ok(false) });
        assert_eq!(v.registered(), vec!["a", "b"]);
        assert_eq!(v.verify_all().await, 1);

        assert!(v.unregister("b"));
        assert!(!v.has_check("b"));
    }
}
