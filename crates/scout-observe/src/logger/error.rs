use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid logger format: {0} (expected: text|json|journald)")]
    InvalidFormat(String),
    #[error("journald is not supported on this platform or the feature is disabled")]
    JournaldNotSupported,
    #[error("logger has already been initialized")]
    AlreadyInitialized,
    #[error("failed to initialize logger: {0}")]
    InitializationFailed(String),
    #[error("invalid log level: {0:?}")]
    InvalidLogLevel(String),
}
