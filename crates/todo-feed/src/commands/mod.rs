//! Command handlers.

pub mod auth;
pub mod feed;
pub mod todos;

use app_config::CoreError;
use auth_bridge::{AuthError, Route};
use collection_sync::StoreError;
use supabase_store::RealtimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// A protected command ran without a signed-in user.
    #[error("{from} needs a signed-in user; redirected to {to}. Run `todo-feed login` first")]
    Redirected { from: Route, to: Route },

    #[error("sign-in could not be started; see the log for details")]
    SignInFailed,

    /// A write was attempted and failed; the detail is in the log.
    #[error("{0}")]
    WriteFailed(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error(transparent)]
    Config(#[from] CoreError),
}

pub type CliResult<T> = Result<T, CliError>;
