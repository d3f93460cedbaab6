//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Short operator-facing hint for the log line that precedes exit.
    pub fn hint(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Create the file or unset WXBOT_CONFIG to use defaults.",
            ConfigError::Invalid(_) => "Fix the listed settings and run again.",
            ConfigError::ParseError(_) => "Configuration file is malformed TOML.",
            ConfigError::Io(_) => "Check file permissions.",
        }
    }
}
