//! Session provider seam.

use crate::{AuthError, AuthResult, ProviderConfig, Session, SessionChange, SessionEvent};
use async_trait::async_trait;
use live_subscription::{ListenerRegistry, Subscription};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Callback for session-change notifications.
pub type SessionHandler = Arc<dyn Fn(&SessionChange) + Send + Sync>;

/// Source of truth for the signed-in identity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Session known right now, without I/O.
    fn current_session(&self) -> Option<Session>;

    /// Register for session changes until the handle is released.
    fn on_session_change(&self, handler: SessionHandler) -> Subscription;

    /// Start a sign-in with the given provider configuration.
    async fn sign_in(&self, config: &ProviderConfig) -> AuthResult<()>;

    /// End the current session.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// In-process provider driven by hand.
///
/// `emit` replaces the current session and notifies listeners, the way the
/// hosted service does after a redirect or a token refresh.
pub struct MemorySessionProvider {
    session: RwLock<Option<Session>>,
    listeners: ListenerRegistry<SessionChange>,
    sign_in_calls: Mutex<Vec<ProviderConfig>>,
    sign_in_failure: Mutex<Option<String>>,
    sign_out_failure: Mutex<Option<String>>,
}

impl Default for MemorySessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionProvider {
    pub fn new() -> Self {
        Self {
            session: RwLock::new(None),
            listeners: ListenerRegistry::new("session"),
            sign_in_calls: Mutex::new(Vec::new()),
            sign_in_failure: Mutex::new(None),
            sign_out_failure: Mutex::new(None),
        }
    }

    pub fn with_session(session: Session) -> Self {
        let provider = Self::new();
        *provider.session.write() = Some(session);
        provider
    }

    /// Replace the session and notify listeners.
    pub fn emit(&self, event: SessionEvent, session: Option<Session>) -> usize {
        *self.session.write() = session.clone();
        self.listeners.emit(&SessionChange::new(event, session))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn sign_in_calls(&self) -> Vec<ProviderConfig> {
        self.sign_in_calls.lock().clone()
    }

    pub fn fail_next_sign_in(&self, reason: impl Into<String>) {
        *self.sign_in_failure.lock() = Some(reason.into());
    }

    pub fn fail_next_sign_out(&self, reason: impl Into<String>) {
        *self.sign_out_failure.lock() = Some(reason.into());
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    fn on_session_change(&self, handler: SessionHandler) -> Subscription {
        self.listeners.register(handler)
    }

    async fn sign_in(&self, config: &ProviderConfig) -> AuthResult<()> {
        self.sign_in_calls.lock().push(config.clone());
        match self.sign_in_failure.lock().take() {
            Some(reason) => Err(AuthError::OAuth(reason)),
            None => Ok(()),
        }
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if let Some(reason) = self.sign_out_failure.lock().take() {
            return Err(AuthError::SessionInvalid(reason));
        }
        self.emit(SessionEvent::SignedOut, None);
        Ok(())
    }
}
