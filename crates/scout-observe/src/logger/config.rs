use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `info,scout_exec=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
        }
    }
}

impl LoggerConfig {
    /// Build from raw settings, e.g. environment variables.
    pub fn parse(format: &str, level: &str) -> Result<Self, LoggerError> {
        let level = level.trim();
        if level.is_empty() {
            return Err(LoggerError::InvalidLogLevel(level.to_string()));
        }
        Ok(Self {
            format: format.parse()?,
            level: level.to_string(),
            ..Default::default()
        })
    }
}
