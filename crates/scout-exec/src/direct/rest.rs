use async_trait::async_trait;
use reqwest::{Client, Url};
use scout_core::Page;
use scout_model::{ApiKey, Cursor, JobArguments};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{DirectAuth, DirectClient};
use crate::error::{ExecError, ExecResult};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

const MIN_SEARCH_PAGE: usize = 10;
const MAX_SEARCH_PAGE: usize = 100;

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Deserialize, Default)]
struct Meta {
    #[serde(default)]
    next_token: Option<String>,
}

/// Key-authenticated client for a v2-style REST search API.
///
/// Only plain bearer keys are usable. Account logins and packed
/// `user:password` keys are reported as unsupported.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base: String,
}

impl RestClient {
    pub fn new(http: Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> ExecResult<Url> {
        Url::parse(&format!("{}{}", self.base, path))
            .map_err(|e| ExecError::InvalidArguments(format!("bad api url: {e}")))
    }

    fn request_url(&self, args: &JobArguments, count: usize, cursor: &Cursor) -> ExecResult<Url> {
        let search = |path: &str| -> ExecResult<Url> {
            if args.query.is_empty() {
                return Err(ExecError::InvalidArguments("search query is empty".into()));
            }
            let mut url = self.url(path)?;
            {
                let mut q = url.query_pairs_mut();
                q.append_pair("query", &args.query);
                q.append_pair(
                    "max_results",
                    &count.clamp(MIN_SEARCH_PAGE, MAX_SEARCH_PAGE).to_string(),
                );
                if !cursor.is_empty() {
                    q.append_pair("next_token", cursor.as_str());
                }
            }
            Ok(url)
        };
        let by_id = |path: &str| -> ExecResult<Url> {
            if args.query.is_empty() || !args.query.chars().all(|c| c.is_ascii_digit()) {
                return Err(ExecError::InvalidArguments(format!("invalid id {:?}", args.query)));
            }
            self.url(&format!("{path}/{}", args.query))
        };

        match args.capability.as_str() {
            "searchbyquery" => search("/tweets/search/recent"),
            "searchbyfullarchive" => search("/tweets/search/all"),
            "getbyid" => by_id("/tweets"),
            "getprofilebyid" => by_id("/users"),
            other => Err(ExecError::Unsupported(format!("capability {other} over the rest api"))),
        }
    }
}

#[async_trait]
impl DirectClient for RestClient {
    fn supports_accounts(&self) -> bool {
        false
    }

    fn supports_key(&self, key: &ApiKey) -> bool {
        !key.is_packed_credential()
    }

    #[instrument(level = "debug", skip(self, auth, cursor), fields(capability = %args.capability))]
    async fn fetch_page(
        &self,
        auth: &DirectAuth,
        args: &JobArguments,
        count: usize,
        cursor: &Cursor,
    ) -> ExecResult<Page<Value>> {
        let key = match auth {
            DirectAuth::Key(key) if self.supports_key(key) => key,
            DirectAuth::Key(_) => {
                return Err(ExecError::Unsupported("packed credential key over the rest api".into()));
            }
            DirectAuth::Account(_) => {
                return Err(ExecError::Unsupported("account login over the rest api".into()));
            }
        };
        let url = self.request_url(args, count, cursor)?;

        let resp = self.http.get(url).bearer_auth(key.secret()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecError::from_status(status, &body));
        }
        let body: Response = resp.json().await?;

        let items = match body.data {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single],
        };
        let next_cursor = body.meta.next_token.map(Cursor::from).unwrap_or_default();
        debug!(items = items.len(), more = !next_cursor.is_empty(), "rest page fetched");
        Ok(Page::new(items, next_cursor))
    }
}
