use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Cursor, ModelError};

/// Job types this worker can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// Worker self-report; always available.
    Telemetry,
    /// Twitter with whichever authentication is available (credential first).
    Twitter,
    /// Twitter over account credentials only.
    TwitterCredential,
    /// Twitter over API keys only.
    TwitterApi,
    /// Twitter through the managed actor platform.
    TwitterApify,
    /// TikTok through the managed actor platform.
    Tiktok,
    /// Reddit through the managed actor platform.
    Reddit,
}

impl JobType {
    pub const ALL: [JobType; 7] = [
        JobType::Telemetry,
        JobType::Twitter,
        JobType::TwitterCredential,
        JobType::TwitterApi,
        JobType::TwitterApify,
        JobType::Tiktok,
        JobType::Reddit,
    ];

    /// Returns the wire identifier of the job type.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Telemetry => "telemetry",
            JobType::Twitter => "twitter",
            JobType::TwitterCredential => "twitter-credential",
            JobType::TwitterApi => "twitter-api",
            JobType::TwitterApify => "twitter-apify",
            JobType::Tiktok => "tiktok",
            JobType::Reddit => "reddit",
        }
    }

    /// Authentication mode used to execute jobs of this type.
    pub fn auth_mode(&self) -> AuthMode {
        match self {
            JobType::Telemetry => AuthMode::None,
            JobType::Twitter => AuthMode::BestAvailable,
            JobType::TwitterCredential => AuthMode::Credential,
            JobType::TwitterApi => AuthMode::Key,
            JobType::TwitterApify | JobType::Tiktok | JobType::Reddit => AuthMode::Actor,
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == norm)
            .ok_or_else(|| ModelError::UnknownJobType(s.to_string()))
    }
}

/// How a job authenticates against its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    None,
    Credential,
    Key,
    BestAvailable,
    Actor,
}

/// Arguments common to every paged scraping job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobArguments {
    /// Capability tag being exercised (e.g. `"searchbyquery"`).
    #[serde(rename = "type")]
    pub capability: String,
    #[serde(default)]
    pub query: String,
    /// Target item count; `0` asks for one best-effort default batch.
    #[serde(default)]
    pub max_results: usize,
    #[serde(default)]
    pub next_cursor: Cursor,
    /// Backend-specific extras, passed through untouched.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl JobArguments {
    pub fn new(capability: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// A unit of work received from the job distributor (already decrypted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub arguments: JobArguments,
    /// Wall-clock budget for the whole job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Job {
    pub fn new(job_type: JobType, arguments: JobArguments) -> Self {
        Self {
            id: String::new(),
            job_type,
            arguments,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}
