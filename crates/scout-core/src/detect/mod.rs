//! Capability detection and advertisement.
//!
//! A detection pass builds the full capability set from what the worker
//! holds: always-on capabilities, tags unlocked by accounts and keys, and
//! actor capabilities when the platform can be probed. Between passes the
//! cached set is filtered through the [`HealthTracker`], so a capability
//! recorded unhealthy disappears from the advertisement until it recovers.

mod source;
pub use source::CapabilitySource;

use std::{error::Error, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use scout_model::{Capability, JobType, WorkerCapabilities, capability_key};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{error::CoreError, health::HealthTracker, pool::CredentialPool};

/// Platform-side entitlement check for one actor.
#[async_trait]
pub trait ActorProbe: Send + Sync + 'static {
    async fn probe_access(
        &self,
        actor_id: &str,
        sample_input: &Value,
    ) -> Result<bool, Box<dyn Error + Send + Sync>>;
}

/// Capabilities unlocked by access to one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorGate {
    pub actor_id: String,
    pub job_type: JobType,
    pub capabilities: Vec<Capability>,
    /// Minimal input used to probe access.
    pub sample_input: Value,
}

/// What each kind of access unlocks.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityCatalog {
    /// Advertised unconditionally.
    pub always_on: WorkerCapabilities,
    /// Unlocked by at least one account.
    pub credential: Vec<Capability>,
    /// Unlocked by a key of basic tier or better.
    pub key_basic: Vec<Capability>,
    /// Unlocked by an elevated (or credential-equivalent) key.
    pub key_elevated: Vec<Capability>,
    pub actors: Vec<ActorGate>,
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        let mut always_on = WorkerCapabilities::new();
        always_on.insert(JobType::Telemetry.as_str(), "telemetry");

        Self {
            always_on,
            credential: tags(&[
                "searchbyquery",
                "searchbyfullarchive",
                "getbyid",
                "getreplies",
                "getprofilebyid",
                "gettrends",
                "getfollowers",
                "getfollowing",
            ]),
            key_basic: tags(&["searchbyquery", "getbyid", "getprofilebyid"]),
            key_elevated: tags(&["searchbyfullarchive"]),
            actors: Vec::new(),
        }
    }
}

impl CapabilityCatalog {
    pub fn with_actor_gates(mut self, gates: Vec<ActorGate>) -> Self {
        self.actors = gates;
        self
    }
}

fn tags(names: &[&str]) -> Vec<Capability> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Builds and serves the capability advertisement.
pub struct CapabilityDetector {
    pool: Arc<CredentialPool>,
    tracker: HealthTracker,
    catalog: CapabilityCatalog,
    probe: Option<Arc<dyn ActorProbe>>,
    snapshot: RwLock<Option<WorkerCapabilities>>,
}

impl CapabilityDetector {
    pub fn new(pool: Arc<CredentialPool>, tracker: HealthTracker, catalog: CapabilityCatalog) -> Self {
        Self {
            pool,
            tracker,
            catalog,
            probe: None,
            snapshot: RwLock::new(None),
        }
    }

    /// Enable actor capabilities, confirmed through `probe` on each pass.
    pub fn with_probe(mut self, probe: Arc<dyn ActorProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    /// Every capability this worker could ever advertise, regardless of the
    /// credentials it holds right now.
    pub fn possible_capabilities(&self) -> WorkerCapabilities {
        let mut caps = self.catalog.always_on.clone();
        self.add_credential_tags(&mut caps);
        self.add_key_tags(&mut caps, &self.catalog.key_basic);
        self.add_key_tags(&mut caps, &self.catalog.key_elevated);
        if self.probe.is_some() {
            for gate in &self.catalog.actors {
                caps.extend(gate.job_type.as_str(), gate.capabilities.iter().cloned());
            }
        }
        caps
    }

    /// Run a detection pass, cache it, and return the advertisement.
    ///
    /// Actor probes record their outcome in the tracker; probe errors are
    /// logged and only hide that actor's capabilities.
    #[instrument(level = "debug", skip(self))]
    pub async fn detect(&self) -> WorkerCapabilities {
        let mut caps = self.catalog.always_on.clone();

        if self.pool.account_count() > 0 {
            self.add_credential_tags(&mut caps);
        }
        if self.pool.has_key_where(|t| t.allows_basic()) {
            self.add_key_tags(&mut caps, &self.catalog.key_basic);
        }
        if self.pool.has_key_where(|t| t.allows_elevated()) {
            self.add_key_tags(&mut caps, &self.catalog.key_elevated);
        }

        if let Some(probe) = &self.probe {
            for gate in &self.catalog.actors {
                let job_type = gate.job_type.as_str();
                caps.extend(job_type, gate.capabilities.iter().cloned());

                let (healthy, error) = match probe.probe_access(&gate.actor_id, &gate.sample_input).await {
                    Ok(true) => (true, None),
                    Ok(false) => (
                        false,
                        Some(
                            CoreError::NotAccessible {
                                what: format!("actor {}", gate.actor_id),
                            }
                            .to_string(),
                        ),
                    ),
                    Err(e) => {
                        warn!(actor = %gate.actor_id, error = %e, "actor probe failed");
                        (false, Some(e.to_string()))
                    }
                };
                for cap in &gate.capabilities {
                    self.tracker
                        .update_status(&capability_key(job_type, cap), healthy, error.as_deref());
                }
            }
        }

        let count = caps.keys().len();
        *self.snapshot.write() = Some(caps.clone());
        let advertised = self.filter(caps);
        info!(detected = count, advertised = advertised.keys().len(), "capability detection finished");
        advertised
    }

    /// Health-filtered view of the last pass, or `None` before the first.
    pub fn advertised(&self) -> Option<WorkerCapabilities> {
        let snapshot = self.snapshot.read().clone()?;
        Some(self.filter(snapshot))
    }

    /// Health-filtered advertisement, detecting first if no pass has run.
    pub async fn current(&self) -> WorkerCapabilities {
        match self.advertised() {
            Some(caps) => caps,
            None => self.detect().await,
        }
    }

    fn filter(&self, mut caps: WorkerCapabilities) -> WorkerCapabilities {
        caps.retain(|job_type, cap| {
            let keep = !self.tracker.is_unhealthy(&capability_key(job_type, cap));
            if !keep {
                debug!(job_type, capability = cap, "withholding unhealthy capability");
            }
            keep
        });
        caps
    }

    fn add_credential_tags(&self, caps: &mut WorkerCapabilities) {
        for job_type in [JobType::TwitterCredential, JobType::Twitter] {
            caps.extend(job_type.as_str(), self.catalog.credential.iter().cloned());
        }
    }

    fn add_key_tags(&self, caps: &mut WorkerCapabilities, tags: &[Capability]) {
        for job_type in [JobType::TwitterApi, JobType::Twitter] {
            caps.extend(job_type.as_str(), tags.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::PoolConfig;
    use scout_model::{ApiKey, Credential, KeyTier};

    struct FixedProbe(Result<bool, &'static str>);

    #[async_trait]
    impl ActorProbe for FixedProbe {
        async fn probe_access(
            &self,
            _actor_id: &str,
            _sample_input: &Value,
        ) -> Result<bool, Box<dyn Error + Send + Sync>> {
            self.0.map_err(Into::into)
        }
    }

    fn gate() -> ActorGate {
        ActorGate {
            actor_id: "acme/reddit-scraper".into(),
            job_type: JobType::Reddit,
            capabilities: tags(&["searchposts", "scrapeurls"]),
            sample_input: json!({"searches": ["rust"], "maxItems": 1}),
        }
    }

    fn detector(accounts: usize, keys: Vec<ApiKey>) -> (CapabilityDetector, HealthTracker) {
        let creds = (0..accounts)
            .map(|i| Credential::new(format!("u{i}"), "p"))
            .collect();
        let pool = Arc::new(CredentialPool::new(creds, keys, &PoolConfig::default()));
        let tracker = HealthTracker::new();
        let catalog = CapabilityCatalog::default().with_actor_gates(vec![gate()]);
        (CapabilityDetector::new(pool, tracker.clone(), catalog), tracker)
    }

    #[tokio::test]
    async fn bare_worker_advertises_telemetry_only() {
        let (d, _) = detector(0, Vec::new());
        let caps = d.detect().await;
        assert_eq!(caps.keys(), vec!["telemetry/telemetry"]);
    }

    #[tokio::test]
    async fn accounts_unlock_credential_tags() {
        let (d, _) = detector(1, Vec::new());
        let caps = d.detect().await;
        assert!(caps.contains("twitter-credential", "searchbyfullarchive"));
        assert!(caps.contains("twitter", "gettrends"));
        assert!(caps.get("twitter-api").is_empty());
    }

    #[tokio::test]
    async fn key_tier_gates_full_archive() {
        let (d, _) = detector(0, vec![ApiKey::new("k1").with_tier(KeyTier::Basic)]);
        let caps = d.detect().await;
        assert!(caps.contains("twitter-api", "searchbyquery"));
        assert!(!caps.contains("twitter-api", "searchbyfullarchive"));

        let (d, _) = detector(0, vec![ApiKey::new("k1").with_tier(KeyTier::Elevated)]);
        assert!(d.detect().await.contains("twitter-api", "searchbyfullarchive"));

        let (d, _) = detector(0, vec![ApiKey::new("k1")]);
        assert!(d.detect().await.get("twitter-api").is_empty());
    }

    #[tokio::test]
    async fn accessible_actor_is_advertised_and_recorded() {
        let (d, tracker) = detector(0, Vec::new());
        let d = d.with_probe(Arc::new(FixedProbe(Ok(true))));

        let caps = d.detect().await;
        assert_eq!(caps.get("reddit"), ["searchposts", "scrapeurls"]);
        assert!(tracker.get_status("reddit/searchposts").unwrap().is_healthy);
    }

    #[tokio::test]
    async fn denied_or_failing_actor_is_withheld() {
        for probe in [FixedProbe(Ok(false)), FixedProbe(Err("connection refused"))] {
            let (d, tracker) = detector(0, Vec::new());
            let d = d.with_probe(Arc::new(probe));

            let caps = d.detect().await;
            assert!(caps.get("reddit").is_empty());
            assert!(tracker.is_unhealthy("reddit/scrapeurls"));
            // still a candidate, so it can come back after recovery
            assert!(d.possible_capabilities().contains("reddit", "scrapeurls"));
        }
    }

    #[tokio::test]
    async fn tracker_downgrades_between_passes() {
        let (d, tracker) = detector(1, Vec::new());
        assert!(d.advertised().is_none());
        d.detect().await;

        tracker.update_status("twitter/gettrends", false, Some("boom"));
        let caps = d.advertised().unwrap();
        assert!(!caps.contains("twitter", "gettrends"));
        assert!(caps.contains("twitter-credential", "gettrends"));

        tracker.update_status("twitter/gettrends", true, None);
        assert!(d.current().await.contains("twitter", "gettrends"));
    }

    #[test]
    fn possible_capabilities_ignore_held_credentials() {
        let (d, _) = detector(0, Vec::new());
        let caps = d.possible_capabilities();
        assert!(caps.contains("twitter-api", "searchbyfullarchive"));
        assert!(caps.contains("twitter-credential", "getfollowers"));
        // no probe configured: actors are out
        assert!(caps.get("reddit").is_empty());
    }
}
