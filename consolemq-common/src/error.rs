use thiserror::Error;

/// Common error type for consolemq components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Result type alias using consolemq's Error.
pub type Result<T> = std::result::Result<T, Error>;
