use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Account credential used by the direct protocol clients.
///
/// Rotation state (cooldown) is not part of the credential itself; the
/// credential pool tracks it next to the value it owns.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub username: String,
    pub password: String,
    /// Optional TOTP secret / 2FA code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub two_factor: Option<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            two_factor: None,
        }
    }

    pub fn with_two_factor(mut self, code: impl Into<String>) -> Self {
        self.two_factor = Some(code.into());
        self
    }

    /// Parse a comma separated list of `user:pass[:2fa]` entries.
    ///
    /// Blank entries are skipped.
    pub fn parse_list(raw: &str) -> Result<Vec<Credential>, ModelError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Credential::from_str)
            .collect()
    }
}

impl FromStr for Credential {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ':');
        let username = parts.next().unwrap_or_default().trim();
        let password = parts.next().unwrap_or_default().trim();
        if username.is_empty() || password.is_empty() {
            return Err(ModelError::InvalidCredential(username.to_string()));
        }

        let mut credential = Credential::new(username, password);
        if let Some(code) = parts.next().map(str::trim).filter(|c| !c.is_empty()) {
            credential = credential.with_two_factor(code);
        }
        Ok(credential)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .field("two_factor", &self.two_factor.as_ref().map(|_| "***"))
            .finish()
    }
}
