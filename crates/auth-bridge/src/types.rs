//! Identity and session types as the hosted auth service reports them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Authenticated user. Profile columns beyond `id`/`email` are kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            profile: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Session issued by the auth service.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: User,
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the server only sent the
    /// latter. An `expires_in` that does not fit leaves the expiry unknown.
    pub fn with_computed_expiry(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self
                .expires_in
                .and_then(|expires_in| Utc::now().timestamp().checked_add(expires_in));
        }
        self
    }

    /// Sessions without an expiry never count as expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at <= Utc::now().timestamp())
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Session-change event names, as emitted by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    UserDeleted,
    PasswordRecovery,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn => "SIGNED_IN",
            SessionEvent::SignedOut => "SIGNED_OUT",
            SessionEvent::TokenRefreshed => "TOKEN_REFRESHED",
            SessionEvent::UserUpdated => "USER_UPDATED",
            SessionEvent::UserDeleted => "USER_DELETED",
            SessionEvent::PasswordRecovery => "PASSWORD_RECOVERY",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification from the session provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Fixed sign-in parameters handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: String,
    pub redirect_to: Option<String>,
    pub scopes: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            redirect_to: None,
            scopes: None,
        }
    }

    pub fn with_redirect_to(mut self, redirect_to: impl Into<String>) -> Self {
        self.redirect_to = Some(redirect_to.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_keeps_profile_fields() {
        let user: User = serde_json::from_value(json!({
            "id": "u-1",
            "email": "ada@example.com",
            "user_metadata": { "user_name": "ada" }
        }))
        .unwrap();

        assert_eq!(user.id, "u-1");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.profile["user_metadata"]["user_name"], "ada");

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["user_metadata"]["user_name"], "ada");
    }

    #[test]
    fn test_session_event_wire_names() {
        assert_eq!(
            serde_json::to_value(SessionEvent::TokenRefreshed).unwrap(),
            json!("TOKEN_REFRESHED")
        );
        let event: SessionEvent = serde_json::from_value(json!("SIGNED_OUT")).unwrap();
        assert_eq!(event, SessionEvent::SignedOut);
        assert_eq!(SessionEvent::PasswordRecovery.to_string(), "PASSWORD_RECOVERY");
    }

    #[test]
    fn test_session_expiry() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "u-1" }
        }))
        .unwrap();
        assert_eq!(session.token_type, "bearer");
        assert!(!session.is_expired());

        let session = session.with_computed_expiry();
        assert!(session.expires_at.is_some());

        let mut stale = session.clone();
        stale.expires_at = Some(0);
        assert!(stale.is_expired());
    }

    #[test]
    fn test_oversized_expires_in_leaves_expiry_unknown() {
        let session = Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: Some(i64::MAX),
            expires_at: None,
            token_type: "bearer".into(),
            user: User::new("u-1"),
        }
        .with_computed_expiry();

        assert_eq!(session.expires_at, None);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_debug_hides_tokens() {
        let session = Session {
            access_token: "secret-access".into(),
            refresh_token: "secret-refresh".into(),
            expires_in: None,
            expires_at: None,
            token_type: "bearer".into(),
            user: User::new("u-1"),
        };
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret"));
    }
}
