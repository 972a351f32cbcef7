//! One-shot API key tier classification.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use scout_core::CredentialPool;
use scout_model::{ApiKey, KeyTier};
use tracing::{debug, instrument, warn};

use crate::error::{ExecError, ExecResult};

/// Full-archive search is only open to elevated access.
pub const DEFAULT_PROBE_URL: &str =
    "https://api.twitter.com/2/tweets/search/all?query=from%3Atwitterdev&max_results=10";

#[async_trait]
pub trait KeyClassifier: Send + Sync + 'static {
    async fn classify(&self, key: &ApiKey) -> ExecResult<KeyTier>;
}

/// Classifies keys with one request against a privileged endpoint.
#[derive(Clone)]
pub struct HttpKeyClassifier {
    http: Client,
    probe_url: Url,
}

impl HttpKeyClassifier {
    pub fn new(http: Client, probe_url: &str) -> ExecResult<Self> {
        let probe_url = Url::parse(probe_url)
            .map_err(|e| ExecError::InvalidArguments(format!("bad probe url {probe_url}: {e}")))?;
        Ok(Self { http, probe_url })
    }
}

#[async_trait]
impl KeyClassifier for HttpKeyClassifier {
    #[instrument(level = "debug", skip_all, fields(key = ?key))]
    async fn classify(&self, key: &ApiKey) -> ExecResult<KeyTier> {
        if key.is_packed_credential() {
            return Ok(KeyTier::CredentialEquivalent);
        }

        let resp = self
            .http
            .get(self.probe_url.clone())
            .bearer_auth(key.secret())
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(KeyTier::Elevated),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(KeyTier::Basic),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(ExecError::from_status(status, &body))
            }
        }
    }
}

/// Classify every unclassified key in `pool`; returns how many were probed.
///
/// A failed probe stores [`KeyTier::Unknown`], which grants nothing.
pub async fn classify_keys(pool: &CredentialPool, classifier: &dyn KeyClassifier) -> usize {
    let pending: Vec<ApiKey> = pool
        .keys()
        .into_iter()
        .filter(|k| k.tier() == KeyTier::Unclassified)
        .collect();

    for key in &pending {
        let tier = match classifier.classify(key).await {
            Ok(tier) => tier,
            Err(e) => {
                warn!(key = ?key, error = %e, "key classification failed");
                KeyTier::Unknown
            }
        };
        debug!(key = ?key, tier = %tier, "key classified");
        pool.set_key_tier(key.secret(), tier);
    }
    pending.len()
}
