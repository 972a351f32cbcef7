use std::{sync::OnceLock, time::Instant};

static WORKER_ID: OnceLock<String> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record the worker start time. Later calls are no-ops.
pub fn init_uptime() {
    START_TIME.get_or_init(Instant::now);
}

/// Seconds since [`init_uptime`] (or since the first call here).
pub fn uptime_seconds() -> u64 {
    START_TIME.get_or_init(Instant::now).elapsed().as_secs()
}

#[inline]
pub fn platform() -> &'static str {
    std::env::consts::OS
}

#[inline]
pub fn arch() -> &'static str {
    std::env::consts::ARCH
}

/// Stable worker identifier for the lifetime of the process.
///
/// `SCOUT_WORKER_ID` wins, then the hostname, then a random uuid.
pub fn worker_id() -> &'static str {
    WORKER_ID.get_or_init(|| {
        if let Ok(id) = std::env::var("SCOUT_WORKER_ID")
            && !id.trim().is_empty()
        {
            return id.trim().to_string();
        }
        if let Ok(host) = hostname::get()
            && let Some(name) = host.to_str()
            && !name.is_empty()
        {
            return name.to_string();
        }
        uuid::Uuid::new_v4().to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_is_stable() {
        let a = worker_id();
        let b = worker_id();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn platform_and_arch_known() {
        assert!(!platform().is_empty());
        assert!(!arch().is_empty());
    }
}
