use std::sync::Arc;

use async_trait::async_trait;
use scout_core::{CredentialPool, Page, accumulate};
use scout_model::{ApiKey, AuthMode, Job, JobType, KeyTier};
use serde_json::Value;
use tracing::{instrument, warn};

use super::{
    ExecContext, Strategy,
    rotation::{with_account, with_key},
};
use crate::{
    direct::{DirectAuth, DirectClient},
    error::{ExecError, ExecResult},
};

/// Whether a key of `tier` may run `capability`.
///
/// Full-archive search needs elevated access; everything else runs on basic.
pub fn key_accepts(capability: &str, tier: KeyTier) -> bool {
    match capability {
        "searchbyfullarchive" => tier.allows_elevated(),
        _ => tier.allows_basic(),
    }
}

/// Whether `client` can serve `capability` with `key`.
pub fn key_usable(client: &dyn DirectClient, capability: &str, key: &ApiKey) -> bool {
    key_accepts(capability, key.tier()) && client.supports_key(key)
}

/// Pages fetched with rotating accounts.
pub struct CredentialStrategy {
    pool: Arc<CredentialPool>,
    client: Arc<dyn DirectClient>,
}

impl CredentialStrategy {
    pub fn new(pool: Arc<CredentialPool>, client: Arc<dyn DirectClient>) -> Self {
        Self { pool, client }
    }

    async fn run(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>> {
        if !self.client.supports_accounts() {
            return Err(ExecError::Unsupported("account auth on this client".into()));
        }
        let args = &job.arguments;
        let target = ctx.retry.target(args.max_results);
        accumulate(target, args.next_cursor.clone(), ctx.deadline, |count, cursor| async move {
            let cursor = &cursor;
            with_account(&self.pool, |credential| {
                let auth = DirectAuth::Account(credential);
                async move { self.client.fetch_page(&auth, args, count, cursor).await }
            })
            .await
        })
        .await
    }
}

#[async_trait]
impl Strategy for CredentialStrategy {
    fn name(&self) -> &'static str {
        "credential"
    }

    fn supports(&self, job_type: JobType) -> bool {
        job_type.auth_mode() == AuthMode::Credential
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job.id))]
    async fn execute(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>> {
        self.run(job, ctx).await
    }
}

/// Pages fetched with rotating API keys of a sufficient tier.
pub struct KeyStrategy {
    pool: Arc<CredentialPool>,
    client: Arc<dyn DirectClient>,
}

impl KeyStrategy {
    pub fn new(pool: Arc<CredentialPool>, client: Arc<dyn DirectClient>) -> Self {
        Self { pool, client }
    }

    async fn run(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>> {
        let args = &job.arguments;
        let capability = args.capability.as_str();
        let target = ctx.retry.target(args.max_results);
        accumulate(target, args.next_cursor.clone(), ctx.deadline, |count, cursor| async move {
            let cursor = &cursor;
            with_key(
                &self.pool,
                |key| key_usable(self.client.as_ref(), capability, key),
                |key| {
                    let auth = DirectAuth::Key(key);
                    async move { self.client.fetch_page(&auth, args, count, cursor).await }
                },
            )
            .await
        })
        .await
    }
}

#[async_trait]
impl Strategy for KeyStrategy {
    fn name(&self) -> &'static str {
        "key"
    }

    fn supports(&self, job_type: JobType) -> bool {
        job_type.auth_mode() == AuthMode::Key
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job.id))]
    async fn execute(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>> {
        self.run(job, ctx).await
    }
}

/// Accounts first, keys when the account path cannot serve the job.
pub struct BestAvailableStrategy {
    credential: CredentialStrategy,
    key: KeyStrategy,
    pool: Arc<CredentialPool>,
}

impl BestAvailableStrategy {
    pub fn new(pool: Arc<CredentialPool>, client: Arc<dyn DirectClient>) -> Self {
        Self {
            credential: CredentialStrategy::new(pool.clone(), client.clone()),
            key: KeyStrategy::new(pool.clone(), client),
            pool,
        }
    }
}

fn falls_back(err: &ExecError) -> bool {
    err.is_rate_limited()
        || matches!(
            err,
            ExecError::Exhausted(_) | ExecError::Unsupported(_) | ExecError::Unauthorized(_)
        )
}

#[async_trait]
impl Strategy for BestAvailableStrategy {
    fn name(&self) -> &'static str {
        "best-available"
    }

    fn supports(&self, job_type: JobType) -> bool {
        job_type.auth_mode() == AuthMode::BestAvailable
    }

    #[instrument(level = "debug", skip_all, fields(job_id = %job.id))]
    async fn execute(&self, job: &Job, ctx: &ExecContext) -> ExecResult<Page<Value>> {
        match self.credential.run(job, ctx).await {
            Err(e) if falls_back(&e) && self.pool.key_count() > 0 => {
                warn!(error = %e, "account path unavailable; falling back to keys");
                self.key.run(job, ctx).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use scout_core::PoolConfig;
    use scout_model::{ApiKey, Credential, Cursor, JobArguments};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;

    /// Serves numbered items; fails for listed usernames or key secrets.
    #[derive(Default)]
    struct FakeClient {
        limited: Vec<String>,
        unsupported_accounts: bool,
        bearer_only: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DirectClient for FakeClient {
        fn supports_accounts(&self) -> bool {
            !self.unsupported_accounts
        }

        fn supports_key(&self, key: &ApiKey) -> bool {
            !(self.bearer_only && key.is_packed_credential())
        }

        async fn fetch_page(
            &self,
            auth: &DirectAuth,
            _args: &JobArguments,
            count: usize,
            cursor: &Cursor,
        ) -> ExecResult<Page<Value>> {
            let who = match auth {
                DirectAuth::Account(c) => c.username.clone(),
                DirectAuth::Key(k) => k.secret().to_string(),
            };
            self.calls.lock().push(who.clone());
            if matches!(auth, DirectAuth::Account(_)) && self.unsupported_accounts {
                return Err(ExecError::Unsupported("accounts".into()));
            }
            if self.limited.contains(&who) {
                return Err(ExecError::RateLimited(who));
            }
            let start = cursor.offset();
            let items = (start..start + count as u64).map(|n| json!({ "n": n, "by": who })).collect();
            Ok(Page::new(items, Cursor::from_offset(start + count as u64)))
        }
    }

    fn job(job_type: JobType, capability: &str, max: usize) -> Job {
        Job::new(job_type, JobArguments::new(capability, "rust").with_max_results(max))
    }

    fn ctx() -> ExecContext {
        ExecContext::new(Duration::from_secs(60), CancellationToken::new())
    }

    fn pool(accounts: &[&str], keys: Vec<ApiKey>) -> Arc<CredentialPool> {
        let creds = accounts.iter().map(|u| Credential::new(*u, "pw")).collect();
        Arc::new(CredentialPool::new(creds, keys, &PoolConfig::default()))
    }

    #[test]
    fn full_archive_needs_elevated_keys() {
        assert!(key_accepts("searchbyquery", KeyTier::Basic));
        assert!(!key_accepts("searchbyfullarchive", KeyTier::Basic));
        assert!(key_accepts("searchbyfullarchive", KeyTier::CredentialEquivalent));
        assert!(!key_accepts("searchbyquery", KeyTier::Unknown));

        let client = FakeClient {
            bearer_only: true,
            ..Default::default()
        };
        let packed = ApiKey::new("u:p").with_tier(KeyTier::CredentialEquivalent);
        assert!(!key_usable(&client, "searchbyquery", &packed));
        assert!(key_usable(&client, "searchbyquery", &ApiKey::new("b").with_tier(KeyTier::Basic)));
    }

    #[tokio::test]
    async fn credential_strategy_rotates_past_rate_limits() {
        let pool = pool(&["a", "b"], Vec::new());
        let client = Arc::new(FakeClient {
            limited: vec!["a".into()],
            ..Default::default()
        });
        let s = CredentialStrategy::new(pool.clone(), client.clone());

        let page = s.execute(&job(JobType::TwitterCredential, "searchbyquery", 5), &ctx()).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0]["by"], "b");
        assert_eq!(pool.available_accounts(), 1);
    }

    #[tokio::test]
    async fn key_strategy_picks_tier_for_capability() {
        let pool = pool(
            &[],
            vec![
                ApiKey::new("basic").with_tier(KeyTier::Basic),
                ApiKey::new("elevated").with_tier(KeyTier::Elevated),
            ],
        );
        let client = Arc::new(FakeClient::default());
        let s = KeyStrategy::new(pool, client.clone());

        s.execute(&job(JobType::TwitterApi, "searchbyfullarchive", 3), &ctx()).await.unwrap();
        assert_eq!(*client.calls.lock(), vec!["elevated"]);
    }

    #[tokio::test]
    async fn key_strategy_without_matching_key_is_exhausted() {
        let pool = pool(&[], vec![ApiKey::new("basic").with_tier(KeyTier::Basic)]);
        let s = KeyStrategy::new(pool, Arc::new(FakeClient::default()));
        let err = s
            .execute(&job(JobType::TwitterApi, "searchbyfullarchive", 3), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Exhausted(_)));
    }

    #[tokio::test]
    async fn best_available_prefers_accounts() {
        let pool = pool(&["a"], vec![ApiKey::new("k").with_tier(KeyTier::Basic)]);
        let client = Arc::new(FakeClient::default());
        let s = BestAvailableStrategy::new(pool, client.clone());

        let page = s.execute(&job(JobType::Twitter, "searchbyquery", 2), &ctx()).await.unwrap();
        assert_eq!(page.items[0]["by"], "a");
    }

    #[tokio::test]
    async fn best_available_falls_back_to_keys() {
        let pool = pool(&["a"], vec![ApiKey::new("k").with_tier(KeyTier::Basic)]);
        let client = Arc::new(FakeClient {
            unsupported_accounts: true,
            ..Default::default()
        });
        let s = BestAvailableStrategy::new(pool, client.clone());

        let page = s.execute(&job(JobType::Twitter, "searchbyquery", 2), &ctx()).await.unwrap();
        assert_eq!(page.items[0]["by"], "k");
        // the account path is never attempted on a client without account auth
        assert_eq!(*client.calls.lock(), vec!["k"]);
    }

    #[tokio::test]
    async fn credential_strategy_refuses_clients_without_account_auth() {
        let pool = pool(&["a"], Vec::new());
        let client = Arc::new(FakeClient {
            unsupported_accounts: true,
            ..Default::default()
        });
        let s = CredentialStrategy::new(pool, client.clone());
        let err = s
            .execute(&job(JobType::TwitterCredential, "searchbyquery", 2), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Unsupported(_)));
        assert!(client.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn key_strategy_skips_keys_the_client_cannot_send() {
        let pool = pool(
            &[],
            vec![
                ApiKey::new("user:pass").with_tier(KeyTier::Basic),
                ApiKey::new("bearer").with_tier(KeyTier::Basic),
            ],
        );
        let client = Arc::new(FakeClient {
            bearer_only: true,
            ..Default::default()
        });
        let s = KeyStrategy::new(pool, client.clone());
        for _ in 0..2 {
            s.execute(&job(JobType::TwitterApi, "searchbyquery", 1), &ctx()).await.unwrap();
        }
        assert_eq!(*client.calls.lock(), vec!["bearer", "bearer"]);
    }

    #[tokio::test]
    async fn best_available_without_keys_reports_account_error() {
        let pool = pool(&[], Vec::new());
        let s = BestAvailableStrategy::new(pool, Arc::new(FakeClient::default()));
        let err = s
            .execute(&job(JobType::Twitter, "searchbyquery", 2), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Exhausted("account")));
    }

    #[test]
    fn strategies_match_auth_modes() {
        let pool = pool(&[], Vec::new());
        let client: Arc<dyn DirectClient> = Arc::new(FakeClient::default());
        assert!(CredentialStrategy::new(pool.clone(), client.clone()).supports(JobType::TwitterCredential));
        assert!(KeyStrategy::new(pool.clone(), client.clone()).supports(JobType::TwitterApi));
        assert!(BestAvailableStrategy::new(pool, client).supports(JobType::Twitter));
    }
}
