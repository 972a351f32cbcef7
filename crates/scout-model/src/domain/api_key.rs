use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Delimiter that marks a key as a packed `consumer:secret` credential pair.
const PACKED_DELIMITER: char = ':';

/// Access tier of an API key, determined by a one-time probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyTier {
    /// Not probed yet.
    #[default]
    Unclassified,
    /// Standard access; privileged endpoints are refused.
    Basic,
    /// Privileged access (e.g. full-archive search).
    Elevated,
    /// A packed credential pair rather than a bearer key.
    CredentialEquivalent,
    /// The probe failed; callers must not assume even basic access.
    Unknown,
}

impl KeyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyTier::Unclassified => "unclassified",
            KeyTier::Basic => "basic",
            KeyTier::Elevated => "elevated",
            KeyTier::CredentialEquivalent => "credential-equivalent",
            KeyTier::Unknown => "unknown",
        }
    }

    /// Whether the tier grants standard read access.
    pub fn allows_basic(&self) -> bool {
        matches!(
            self,
            KeyTier::Basic | KeyTier::Elevated | KeyTier::CredentialEquivalent
        )
    }

    /// Whether the tier grants the privileged, higher-cost operations.
    pub fn allows_elevated(&self) -> bool {
        matches!(self, KeyTier::Elevated | KeyTier::CredentialEquivalent)
    }
}

impl fmt::Display for KeyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyTier {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unclassified" => Ok(KeyTier::Unclassified),
            "basic" | "base" => Ok(KeyTier::Basic),
            "elevated" => Ok(KeyTier::Elevated),
            "credential-equivalent" | "credential" => Ok(KeyTier::CredentialEquivalent),
            "unknown" => Ok(KeyTier::Unknown),
            other => Err(ModelError::UnknownKeyTier(other.to_string())),
        }
    }
}

/// API key with its cached classification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    secret: String,
    #[serde(default)]
    tier: KeyTier,
}

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tier: KeyTier::Unclassified,
        }
    }

    pub fn with_tier(mut self, tier: KeyTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn tier(&self) -> KeyTier {
        self.tier
    }

    pub fn set_tier(&mut self, tier: KeyTier) {
        self.tier = tier;
    }

    /// Keys carrying the pair delimiter are credential-equivalent and never probed.
    pub fn is_packed_credential(&self) -> bool {
        self.secret.contains(PACKED_DELIMITER)
    }

    /// Parse a comma separated key list, skipping blanks.
    pub fn parse_list(raw: &str) -> Vec<ApiKey> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ApiKey::new)
            .collect()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.secret.chars().take(4).collect();
        f.debug_struct("ApiKey")
            .field("secret", &format!("{visible}***"))
            .field("tier", &self.tier)
            .finish()
    }
}
