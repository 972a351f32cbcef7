use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{Capability, CapabilityKey};

const KEY_SEPARATOR: char = '/';

/// Build the health-tracking key for a capability advertised under a job type.
pub fn capability_key(job_type: &str, capability: &str) -> CapabilityKey {
    format!("{job_type}{KEY_SEPARATOR}{capability}")
}

/// Split a key produced by [`capability_key`] back into `(job_type, capability)`.
pub fn split_capability_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

/// Health record of a single capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub name: String,
    pub is_healthy: bool,
    #[serde(with = "time_serde")]
    pub last_checked: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Consecutive unhealthy checks that carried an error.
    pub error_count: u32,
}

impl CapabilityStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_healthy: false,
            last_checked: UNIX_EPOCH,
            last_error: None,
            error_count: 0,
        }
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

/// Capability advertisement: job type -> ordered, de-duplicated capability tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerCapabilities(pub BTreeMap<String, Vec<Capability>>);

impl WorkerCapabilities {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Add one tag, keeping first-insertion order and skipping duplicates.
    pub fn insert(&mut self, job_type: impl Into<String>, capability: impl Into<Capability>) {
        let capability = capability.into();
        let tags = self.0.entry(job_type.into()).or_default();
        if !tags.contains(&capability) {
            tags.push(capability);
        }
    }

    pub fn extend<I, C>(&mut self, job_type: &str, capabilities: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        for capability in capabilities {
            self.insert(job_type, capability);
        }
    }

    pub fn get(&self, job_type: &str) -> &[Capability] {
        self.0.get(job_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, job_type: &str, capability: &str) -> bool {
        self.get(job_type).iter().any(|c| c == capability)
    }

    /// Keep only tags accepted by `keep`; job types left empty are dropped.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        for (job_type, tags) in self.0.iter_mut() {
            tags.retain(|tag| keep(job_type, tag));
        }
        self.0.retain(|_, tags| !tags.is_empty());
    }

    /// All `(job_type, capability)` pairs as health keys.
    pub fn keys(&self) -> Vec<CapabilityKey> {
        self.0
            .iter()
            .flat_map(|(job_type, tags)| tags.iter().map(move |t| capability_key(job_type, t)))
            .collect()
    }
}
