use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{config::HealthConfig, health::HealthTracker, verify::Verifier};

/// Periodic re-verification of unhealthy capabilities.
///
/// Each tick re-checks every unhealthy capability whose backoff window
/// (`base_backoff * error_count`, optionally capped) has elapsed since its
/// last check. Capabilities without a registered check are left alone.
pub struct Reconciler {
    verifier: Arc<Verifier>,
    tracker: HealthTracker,
    config: HealthConfig,
}

impl Reconciler {
    pub fn new(verifier: Arc<Verifier>, config: HealthConfig) -> Self {
        let tracker = verifier.tracker().clone();
        Self {
            verifier,
            tracker,
            config,
        }
    }

    /// Unhealthy capabilities due for a re-check at `now`, sorted by name.
    pub fn due(&self, now: SystemTime) -> Vec<String> {
        let mut due: Vec<String> = self
            .tracker
            .unhealthy()
            .into_iter()
            .filter(|s| self.verifier.has_check(&s.name))
            .filter(|s| {
                let elapsed = now.duration_since(s.last_checked).unwrap_or(Duration::ZERO);
                elapsed >= self.config.backoff_for(s.error_count)
            })
            .map(|s| s.name)
            .collect();
        due.sort();
        due
    }

    /// Run one reconciliation pass; returns how many capabilities recovered.
    #[instrument(level = "debug", skip(self))]
    pub async fn reconcile_once(&self) -> usize {
        let due = self.due(SystemTime::now());
        if due.is_empty() {
            return 0;
        }

        debug!(count = due.len(), "re-verifying unhealthy capabilities");
        let mut recovered = 0;
        for name in &due {
            if self.verifier.verify(name).await {
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!(recovered, checked = due.len(), "capabilities recovered");
        }
        recovered
    }

    /// Tick until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.reconcile_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval = ?self.config.reconcile_interval, "health reconciliation started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = self.reconcile_once() => {}
                    }
                }
            }
        }
        debug!("health reconciliation stopped");
    }

    /// Spawn [`Reconciler::run`] on the current runtime.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }
}
