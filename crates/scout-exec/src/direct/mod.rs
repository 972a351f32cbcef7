//! Direct protocol clients used by the credential and key strategies.

#[cfg(feature = "rest")]
mod rest;
#[cfg(feature = "rest")]
pub use rest::{DEFAULT_BASE_URL, RestClient};

use async_trait::async_trait;
use scout_core::Page;
use scout_model::{ApiKey, Credential, Cursor, JobArguments};
use serde_json::Value;

use crate::error::ExecResult;

/// Authentication a direct call is made with.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectAuth {
    Account(Credential),
    Key(ApiKey),
}

/// One page of a direct (non-actor) query.
///
/// `supports_accounts` and `supports_key` tell strategies and health checks
/// which credentials this client can actually authenticate with, so nothing
/// is advertised or attempted over a path the client would reject.
#[async_trait]
pub trait DirectClient: Send + Sync + 'static {
    fn supports_accounts(&self) -> bool {
        true
    }

    fn supports_key(&self, _key: &ApiKey) -> bool {
        true
    }

    async fn fetch_page(
        &self,
        auth: &DirectAuth,
        args: &JobArguments,
        count: usize,
        cursor: &Cursor,
    ) -> ExecResult<Page<Value>>;
}
