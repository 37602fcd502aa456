//! Row store error types.

use crate::ChangeKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend refused the request.
    #[error("{table}: request rejected (HTTP {status}): {message}")]
    Rejected {
        table: String,
        status: u16,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed change event: {0}")]
    MalformedEvent(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Subscribing to {table} {kind} failed: {reason}")]
    Subscribe {
        table: String,
        kind: ChangeKind,
        reason: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
