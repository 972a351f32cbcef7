use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use scout_model::{RunHandle, RunStatus};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::ActorPlatform;
use crate::error::{ExecError, ExecResult};

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunData {
    id: String,
    #[serde(default)]
    default_dataset_id: String,
    status: RunStatus,
}

/// HTTP client for an Apify-compatible actor platform.
#[derive(Clone)]
pub struct ApifyClient {
    http: Client,
    base: String,
    token: String,
}

impl ApifyClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), DEFAULT_BASE_URL, token)
    }

    pub fn with_client(http: Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> ExecResult<Url> {
        Url::parse(&format!("{}{}", self.base, path))
            .map_err(|e| ExecError::InvalidArguments(format!("bad platform url: {e}")))
    }
}

/// Actor ids are `owner/name`; the API addresses them as `owner~name`.
fn actor_path(actor_id: &str) -> String {
    actor_id.replace('/', "~")
}

async fn ensure_success(resp: Response) -> ExecResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ExecError::from_status(status, &body))
}

#[async_trait]
impl ActorPlatform for ApifyClient {
    #[instrument(level = "debug", skip(self, input))]
    async fn start_run(&self, actor_id: &str, input: &Value) -> ExecResult<RunHandle> {
        let url = self.url(&format!("/acts/{}/runs", actor_path(actor_id)))?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;
        let run: Envelope<RunData> = ensure_success(resp).await?.json().await?;
        debug!(run_id = %run.data.id, status = run.data.status.as_str(), "run started");

        Ok(RunHandle {
            run_id: run.data.id,
            dataset_id: run.data.default_dataset_id,
        })
    }

    async fn run_status(&self, run_id: &str) -> ExecResult<RunStatus> {
        let url = self.url(&format!("/actor-runs/{run_id}"))?;
        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        let run: Envelope<RunData> = ensure_success(resp).await?.json().await?;
        Ok(run.data.status)
    }

    async fn dataset_items(&self, dataset_id: &str, offset: u64, limit: usize) -> ExecResult<Vec<Value>> {
        let mut url = self.url(&format!("/datasets/{dataset_id}/items"))?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("clean", "1")
            .append_pair("format", "json");

        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    #[instrument(level = "debug", skip(self, sample_input))]
    async fn probe_access(&self, actor_id: &str, sample_input: &Value) -> ExecResult<bool> {
        let url = self.url(&format!("/acts/{}/validate-input", actor_path(actor_id)))?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(sample_input)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(false),
            _ => ensure_success(resp).await.map(|_| false),
        }
    }
}
