//! Authentication error types.

use thiserror::Error;

/// Errors from the session provider and its local persistence.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The hosted provider reported an error on the redirect, or the
    /// redirect did not carry the expected tokens.
    #[error("OAuth sign-in failed: {0}")]
    OAuth(String),

    #[error("token refresh rejected: {0}")]
    TokenRefresh(String),

    #[error("no session; sign in first")]
    NotLoggedIn,

    /// Session was rejected by the auth server (revoked, expired, malformed).
    #[error("session rejected: {0}")]
    SessionInvalid(String),

    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed auth payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid auth URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("auth misconfigured: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true for connection failures, timeouts and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_are_not_transient() {
        assert!(!AuthError::NotLoggedIn.is_transient());
        assert!(!AuthError::OAuth("access_denied".to_string()).is_transient());
        assert!(!AuthError::SessionInvalid("revoked".to_string()).is_transient());
        assert!(!AuthError::Config("empty provider".to_string()).is_transient());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = AuthError::TokenRefresh("HTTP 400".to_string());
        assert_eq!(err.to_string(), "token refresh rejected: HTTP 400");
    }
}
