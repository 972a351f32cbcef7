use std::future::Future;

use scout_core::CredentialPool;
use scout_model::{ApiKey, Credential};
use tracing::debug;

use crate::error::{ExecError, ExecResult};

/// Run `op` with the next available account.
///
/// A rate-limited attempt cools that account down and retries with the next
/// one, for at most as many attempts as the pool has accounts. Any other
/// outcome is returned as is.
pub async fn with_account<T, F, Fut>(pool: &CredentialPool, mut op: F) -> ExecResult<T>
where
    F: FnMut(Credential) -> Fut,
    Fut: Future<Output = ExecResult<T>>,
{
    let mut last = None;
    for attempt in 0..pool.account_count() {
        let Some(credential) = pool.next_account() else {
            break;
        };
        match op(credential.clone()).await {
            Err(e) if e.is_rate_limited() => {
                debug!(attempt, username = %credential.username, "attempt rate limited; rotating");
                pool.mark_rate_limited(&credential);
                last = Some(e);
            }
            other => return other,
        }
    }
    Err(last.unwrap_or(ExecError::Exhausted("account")))
}

/// Run `op` with the next key that `accept` admits.
///
/// Keys are not cooled down; a rate-limited attempt just moves on to the
/// next key, at most once per key.
pub async fn with_key<T, A, F, Fut>(pool: &CredentialPool, mut accept: A, mut op: F) -> ExecResult<T>
where
    A: FnMut(&ApiKey) -> bool,
    F: FnMut(ApiKey) -> Fut,
    Fut: Future<Output = ExecResult<T>>,
{
    let mut last = None;
    for attempt in 0..pool.key_count() {
        let Some(key) = pool.next_api_key_matching(&mut accept) else {
            break;
        };
        match op(key).await {
            Err(e) if e.is_rate_limited() => {
                debug!(attempt, "key rate limited; rotating");
                last = Some(e);
            }
            other => return other,
        }
    }
    Err(last.unwrap_or(ExecError::Exhausted("api key")))
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use scout_core::PoolConfig;
    use scout_model::KeyTier;

    use super::*;

    fn pool(accounts: usize, keys: Vec<ApiKey>) -> CredentialPool {
        let creds = (0..accounts)
            .map(|i| Credential::new(format!("user{i}"), "pw"))
            .collect();
        CredentialPool::new(creds, keys, &PoolConfig::default())
    }

    #[tokio::test]
    async fn rate_limited_account_is_cooled_and_rotated() {
        let pool = pool(3, Vec::new());
        let seen = Mutex::new(Vec::new());

        let res = with_account(&pool, |cred| {
            seen.lock().push(cred.username.clone());
            let limited = cred.username == "user0";
            async move {
                if limited {
                    Err(ExecError::RateLimited("429".into()))
                } else {
                    Ok(cred.username)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(res, "user1");
        assert_eq!(*seen.lock(), vec!["user0", "user1"]);
        assert_eq!(pool.available_accounts(), 2);
    }

    #[tokio::test]
    async fn all_rate_limited_surfaces_rate_limit() {
        let pool = pool(2, Vec::new());
        let mut calls = 0;
        let err = with_account(&pool, |_| {
            calls += 1;
            async { Err::<(), _>(ExecError::RateLimited("429".into())) }
        })
        .await
        .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(calls, 2);
        assert_eq!(pool.available_accounts(), 0);

        let err = with_account(&pool, |_| async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, ExecError::Exhausted("account")));
    }

    #[tokio::test]
    async fn other_errors_do_not_cool_down() {
        let pool = pool(2, Vec::new());
        let err = with_account(&pool, |_| async { Err::<(), _>(ExecError::Transport("reset".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Transport(_)));
        assert_eq!(pool.available_accounts(), 2);
    }

    #[tokio::test]
    async fn key_rotation_respects_tier() {
        let pool = pool(
            0,
            vec![
                ApiKey::new("basic").with_tier(KeyTier::Basic),
                ApiKey::new("elevated").with_tier(KeyTier::Elevated),
            ],
        );

        let got = with_key(&pool, |k| k.tier().allows_elevated(), |k| async move { Ok(k.secret().to_string()) })
            .await
            .unwrap();
        assert_eq!(got, "elevated");

        let empty = self::pool(0, vec![ApiKey::new("u")]);
        let err = with_key(&empty, |k| k.tier().allows_basic(), |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Exhausted("api key")));
    }
}
