use std::time::Duration;

use crate::{error::CoreError, retry::DEFAULT_BATCH_SIZE};

/// Credential pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How long a rate-limited account stays out of rotation.
    pub cooldown: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(15 * 60),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.cooldown.is_zero() {
            return Err(CoreError::InvalidConfig("cooldown must be positive".into()));
        }
        Ok(())
    }
}

/// Paged-fetch settings.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Items gathered for a job that asks for `0`.
    pub default_batch_size: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.default_batch_size == 0 {
            return Err(CoreError::InvalidConfig("default_batch_size must be positive".into()));
        }
        Ok(())
    }

    /// Item target for a request of `requested` items.
    pub fn target(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_batch_size
        } else {
            requested
        }
    }
}

/// Health tracking and reconciliation settings.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Reconciliation tick period.
    pub reconcile_interval: Duration,
    /// Backoff unit; the window is `base_backoff * error_count`.
    pub base_backoff: Duration,
    /// Optional ceiling on the backoff window. `None` keeps it unbounded.
    pub max_backoff: Option<Duration>,
    /// Upper bound for a single capability check.
    pub verify_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(60),
            base_backoff: Duration::from_secs(5 * 60),
            max_backoff: None,
            verify_timeout: Duration::from_secs(30),
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.reconcile_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "reconcile_interval must be positive".into(),
            ));
        }
        if self.verify_timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "verify_timeout must be positive".into(),
            ));
        }
        if let Some(max) = self.max_backoff
            && max < self.base_backoff
        {
            return Err(CoreError::InvalidConfig(format!(
                "max_backoff ({max:?}) is below base_backoff ({:?})",
                self.base_backoff
            )));
        }
        Ok(())
    }

    /// Backoff window after `error_count` consecutive failures.
    pub fn backoff_for(&self, error_count: u32) -> Duration {
        let window = self.base_backoff.saturating_mul(error_count);
        match self.max_backoff {
            Some(max) => window.min(max),
            None => window,
        }
    }
}
