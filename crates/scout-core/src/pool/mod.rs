//! Rotating pool of account credentials and API keys.
//!
//! Accounts and keys each sit behind one mutex that guards both the slice
//! and its round-robin index. Locks are held for the scan only, never
//! across I/O.

mod rotation;

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use scout_model::{ApiKey, Credential, KeyTier};
use tracing::debug;

use crate::{
    config::PoolConfig,
    events::{EventBus, WorkerEvent},
};
use rotation::Rotation;

#[derive(Debug)]
struct Account {
    credential: Credential,
    cooldown_until: Option<Instant>,
}

impl Account {
    fn is_available(&self, now: Instant) -> bool {
        self.cooldown_until.is_none_or(|until| until <= now)
    }
}

/// Owner of every credential and key the worker may use.
#[derive(Debug)]
pub struct CredentialPool {
    accounts: Mutex<Rotation<Account>>,
    keys: Mutex<Rotation<ApiKey>>,
    cooldown: Duration,
    events: EventBus,
}

impl CredentialPool {
    pub fn new(accounts: Vec<Credential>, keys: Vec<ApiKey>, config: &PoolConfig) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|credential| Account {
                credential,
                cooldown_until: None,
            })
            .collect();

        Self {
            accounts: Mutex::new(Rotation::new(accounts)),
            keys: Mutex::new(Rotation::new(keys)),
            cooldown: config.cooldown,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn key_count(&self) -> usize {
        self.keys.lock().len()
    }

    /// Accounts that are not cooling down right now.
    pub fn available_accounts(&self) -> usize {
        let now = Instant::now();
        self.accounts
            .lock()
            .items()
            .iter()
            .filter(|a| a.is_available(now))
            .count()
    }

    /// Next account whose cooldown has passed, or `None` after one full scan.
    pub fn next_account(&self) -> Option<Credential> {
        let now = Instant::now();
        let mut accounts = self.accounts.lock();
        let idx = accounts.next_where(|a| a.is_available(now))?;
        Some(accounts.items()[idx].credential.clone())
    }

    /// Take an account out of rotation for the configured cooldown.
    ///
    /// Returns `false` when the account does not belong to this pool.
    pub fn mark_rate_limited(&self, credential: &Credential) -> bool {
        let until = Instant::now() + self.cooldown;
        let found = {
            let mut accounts = self.accounts.lock();
            match accounts
                .items_mut()
                .iter_mut()
                .find(|a| a.credential.username == credential.username)
            {
                Some(account) => {
                    account.cooldown_until = Some(until);
                    true
                }
                None => false,
            }
        };

        if found {
            self.events.publish(WorkerEvent::CredentialCooledDown {
                username: credential.username.clone(),
                cooldown: self.cooldown,
            });
        } else {
            debug!(username = %credential.username, "rate limit reported for unknown account");
        }
        found
    }

    /// Next key in rotation. Keys are not cooled down individually.
    pub fn next_api_key(&self) -> Option<ApiKey> {
        self.next_api_key_where(|_| true)
    }

    /// Next key whose tier satisfies `accept`, scanning at most every key once.
    pub fn next_api_key_where<F>(&self, mut accept: F) -> Option<ApiKey>
    where
        F: FnMut(KeyTier) -> bool,
    {
        self.next_api_key_matching(|k| accept(k.tier()))
    }

    /// Next key accepted by `accept`, scanning at most every key once.
    pub fn next_api_key_matching<F>(&self, accept: F) -> Option<ApiKey>
    where
        F: FnMut(&ApiKey) -> bool,
    {
        let mut keys = self.keys.lock();
        let idx = keys.next_where(accept)?;
        Some(keys.items()[idx].clone())
    }

    /// Copy of every key with its current classification.
    pub fn keys(&self) -> Vec<ApiKey> {
        self.keys.lock().items().to_vec()
    }

    /// Store the classification of the key with the given secret.
    pub fn set_key_tier(&self, secret: &str, tier: KeyTier) -> bool {
        let mut keys = self.keys.lock();
        match keys.items_mut().iter_mut().find(|k| k.secret() == secret) {
            Some(key) => {
                key.set_tier(tier);
                true
            }
            None => false,
        }
    }

    /// Whether any key grants at least the access `accept` asks for.
    pub fn has_key_where<F>(&self, mut accept: F) -> bool
    where
        F: FnMut(KeyTier) -> bool,
    {
        self.has_key_matching(|k| accept(k.tier()))
    }

    pub fn has_key_matching<F>(&self, accept: F) -> bool
    where
        F: FnMut(&ApiKey) -> bool,
    {
        self.keys.lock().items().iter().any(accept)
    }
}
