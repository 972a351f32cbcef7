use std::{fmt, net::SocketAddr, time::Duration};

use anyhow::{Context, bail};
use scout_core::{HealthConfig, PoolConfig, RetryConfig};
use scout_exec::ActorConfig;
use scout_model::{ApiKey, Credential};
use scout_observe::LoggerConfig;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

/// Daemon settings, read from `SCOUT_*` environment variables.
#[derive(Clone)]
pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
    pub logger: LoggerConfig,
    pub accounts: Vec<Credential>,
    pub api_keys: Vec<ApiKey>,
    /// Actor platform token; actor capabilities stay off without it.
    pub actor_token: Option<String>,
    pub actor_base_url: String,
    pub direct_base_url: String,
    pub classify_url: String,
    pub pool: PoolConfig,
    pub health: HealthConfig,
    pub actor: ActorConfig,
    pub retry: RetryConfig,
    pub job_timeout: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset and blank variables
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr = var("SCOUT_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("SCOUT_LISTEN_ADDR")?;

        let logger = LoggerConfig::parse(
            &var("SCOUT_LOG_FORMAT").unwrap_or_default(),
            &var("SCOUT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        )
        .context("logger settings")?;

        let accounts = match var("SCOUT_ACCOUNTS") {
            Some(raw) => Credential::parse_list(&raw).context("SCOUT_ACCOUNTS")?,
            None => Vec::new(),
        };
        let api_keys = var("SCOUT_API_KEYS")
            .map(|raw| ApiKey::parse_list(&raw))
            .unwrap_or_default();

        let mut pool = PoolConfig::default();
        if let Some(secs) = secs_var(&var, "SCOUT_COOLDOWN_SECS")? {
            pool.cooldown = secs;
        }

        let mut health = HealthConfig::default();
        if let Some(secs) = secs_var(&var, "SCOUT_RECONCILE_INTERVAL_SECS")? {
            health.reconcile_interval = secs;
        }
        health.max_backoff = secs_var(&var, "SCOUT_MAX_BACKOFF_SECS")?;

        let mut actor = ActorConfig::default();
        if let Some(secs) = secs_var(&var, "SCOUT_ACTOR_POLL_INTERVAL_SECS")? {
            actor.poll_interval = secs;
        }
        if let Some(n) = num_var(&var, "SCOUT_ACTOR_MAX_POLLS")? {
            actor.max_polls = n;
        }
        if let Some(n) = num_var(&var, "SCOUT_ACTOR_PAGE_SIZE")? {
            actor.page_size = n;
        }

        let mut retry = RetryConfig::default();
        if let Some(n) = num_var(&var, "SCOUT_DEFAULT_BATCH_SIZE")? {
            retry.default_batch_size = n;
        }

        let job_timeout = secs_var(&var, "SCOUT_JOB_TIMEOUT_SECS")?.unwrap_or(DEFAULT_JOB_TIMEOUT);

        let cfg = Self {
            listen_addr,
            logger,
            accounts,
            api_keys,
            actor_token: var("SCOUT_ACTOR_TOKEN"),
            actor_base_url: var("SCOUT_ACTOR_BASE_URL")
                .unwrap_or_else(|| scout_exec::actor::DEFAULT_BASE_URL.to_string()),
            direct_base_url: var("SCOUT_DIRECT_BASE_URL")
                .unwrap_or_else(|| scout_exec::direct::DEFAULT_BASE_URL.to_string()),
            classify_url: var("SCOUT_CLASSIFY_URL")
                .unwrap_or_else(|| scout_exec::classify::DEFAULT_PROBE_URL.to_string()),
            pool,
            health,
            actor,
            retry,
            job_timeout,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.pool.validate().context("pool settings")?;
        self.health.validate().context("health settings")?;
        self.actor.validate().context("actor settings")?;
        self.retry.validate().context("retry settings")?;
        if self.job_timeout.is_zero() {
            bail!("SCOUT_JOB_TIMEOUT_SECS must be positive");
        }
        for (name, url) in [
            ("SCOUT_ACTOR_BASE_URL", &self.actor_base_url),
            ("SCOUT_DIRECT_BASE_URL", &self.direct_base_url),
            ("SCOUT_CLASSIFY_URL", &self.classify_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("{name} must be an http(s) URL, got {url:?}");
            }
        }
        Ok(())
    }
}

fn secs_var<V>(var: &V, name: &str) -> anyhow::Result<Option<Duration>>
where
    V: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("{name}: expected whole seconds, got {raw:?}"))
        })
        .transpose()
}

fn num_var<V, N>(var: &V, name: &str) -> anyhow::Result<Option<N>>
where
    V: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
    N::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|raw| {
            raw.parse::<N>()
                .with_context(|| format!("{name}: expected a whole number, got {raw:?}"))
        })
        .transpose()
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("logger", &self.logger)
            .field("accounts", &self.accounts.len())
            .field("api_keys", &self.api_keys.len())
            .field("actor_token", &self.actor_token.as_ref().map(|_| "<redacted>"))
            .field("actor_base_url", &self.actor_base_url)
            .field("direct_base_url", &self.direct_base_url)
            .field("classify_url", &self.classify_url)
            .field("pool", &self.pool)
            .field("health", &self.health)
            .field("actor", &self.actor)
            .field("retry", &self.retry)
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}
