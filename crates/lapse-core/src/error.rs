use thiserror::Error;

#[derive(Debug, Error)]
pub enum LapseError {
    /// A blocking wait was cancelled by a shutdown signal.
    #[error("interrupted while waiting for the next expired item")]
    Interrupted,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LapseError>;
