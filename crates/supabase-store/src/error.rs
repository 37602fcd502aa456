//! Error types for the Supabase adapters.

use collection_sync::StoreError;
use thiserror::Error;

/// Errors from the PostgREST client.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Network or transport-level HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supabase answered with a non-success status.
    ///
    /// Common causes: expired token, row-level security policy, schema mismatch.
    #[error("Supabase error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// Errors from the realtime websocket client.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid realtime URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client was shut down; no new subscriptions are accepted.
    #[error("Realtime client closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl SupabaseError {
    /// Attach the table name the request was for.
    pub fn into_store_error(self, table: &str) -> StoreError {
        match self {
            SupabaseError::Api { status, message } => StoreError::Rejected {
                table: table.to_string(),
                status,
                message,
            },
            SupabaseError::Http(e) => StoreError::Transport(e.to_string()),
            SupabaseError::Json(e) => StoreError::Decode(e),
            SupabaseError::Config(message) => StoreError::Transport(message),
        }
    }
}

impl From<RealtimeError> for StoreError {
    fn from(error: RealtimeError) -> Self {
        match error {
            RealtimeError::Closed => StoreError::NotConnected("realtime client closed".to_string()),
            other => StoreError::Transport(other.to_string()),
        }
    }
}
