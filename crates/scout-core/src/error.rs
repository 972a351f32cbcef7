use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no verifier available for capability {0}")]
    NoVerifier(String),

    #[error("verification timed out after {0:?}")]
    CheckTimeout(Duration),

    #[error("verifier panicked: {0}")]
    CheckPanicked(String),

    #[error("verifier aborted: {0}")]
    CheckAborted(String),

    #[error("{what} not accessible")]
    NotAccessible { what: String },
}
