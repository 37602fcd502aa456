use std::path::PathBuf;
use thiserror::Error;

/// Failure to resolve paths or load configuration.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid config: {0}")]
    Config(String),

    /// `config.json` exists but is not a valid config document.
    #[error("cannot parse {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL in config: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("home directory not found")]
    NoHomeDir,
}

pub type CoreResult<T> = Result<T, CoreError>;
