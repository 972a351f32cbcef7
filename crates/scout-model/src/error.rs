use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid credential entry: {0}")]
    InvalidCredential(String),
    #[error("unknown job type: {0}")]
    UnknownJobType(String),
    #[error("unknown key tier: {0}")]
    UnknownKeyTier(String),
}
