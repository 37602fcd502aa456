//! Application-wide authentication state.
//!
//! [`AuthContext`] mirrors the session provider into a single snapshot that
//! views read. It holds exactly one session-change subscription between
//! [`AuthContext::init`] and [`AuthContext::teardown`].

use crate::auth_fsm::{input_for, AuthMachine, AuthState};
use crate::{
    AuditRecord, AuditSink, Navigator, ProviderConfig, Route, Session, SessionChange,
    SessionProvider, User,
};
use live_subscription::Subscription;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity and session as of the latest notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl AuthSnapshot {
    fn anonymous() -> Self {
        Self {
            state: AuthState::Anonymous,
            user: None,
            session: None,
        }
    }
}

struct Shared {
    fsm: Mutex<AuthMachine>,
    snapshot: RwLock<AuthSnapshot>,
    audit: Arc<dyn AuditSink>,
}

impl Shared {
    /// Apply a session to the machine and publish identity and session in one
    /// write.
    fn apply(&self, session: Option<Session>) -> AuthState {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        let input = input_for(session.is_some());
        if fsm.consume(&input).is_err() {
            // Both inputs are accepted in both states.
            warn!(?input, state = ?old_state, "auth machine rejected input");
        }
        let new_state = AuthState::from(fsm.state());

        *self.snapshot.write() = AuthSnapshot {
            state: new_state,
            user: session.as_ref().map(|s| s.user.clone()),
            session,
        };
        drop(fsm);

        if old_state != new_state {
            debug!(?old_state, ?new_state, "Auth state transition");
        }
        new_state
    }

    fn handle_change(&self, change: &SessionChange) {
        let state = self.apply(change.session.clone());
        info!(event = %change.event, state = state.as_str(), "session changed");

        self.audit.record(AuditRecord {
            event: change.event,
            session: change.session.clone(),
        });
    }
}

/// Shared authentication state, passed to consumers by `Arc`.
pub struct AuthContext {
    shared: Arc<Shared>,
    provider: Arc<dyn SessionProvider>,
    navigator: Arc<dyn Navigator>,
    sign_in: ProviderConfig,
    subscription: Mutex<Option<Subscription>>,
}

impl AuthContext {
    /// Read the current session and subscribe to changes.
    ///
    /// The initial read is not audited.
    pub fn init(
        provider: Arc<dyn SessionProvider>,
        audit: Arc<dyn AuditSink>,
        navigator: Arc<dyn Navigator>,
        sign_in: ProviderConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            fsm: Mutex::new(AuthMachine::new()),
            snapshot: RwLock::new(AuthSnapshot::anonymous()),
            audit,
        });

        if let Some(session) = provider.current_session() {
            debug!(user_id = %session.user.id, "restoring current session");
            shared.apply(Some(session));
        }

        let handler_state = shared.clone();
        let subscription = provider.on_session_change(Arc::new(move |change: &SessionChange| {
            handler_state.handle_change(change);
        }));

        Self {
            shared,
            provider,
            navigator,
            sign_in,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Release the session-change subscription.
    pub fn teardown(self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        debug!("auth context torn down");
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.snapshot.read().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.shared.snapshot.read().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.snapshot.read().session.clone()
    }

    pub fn state(&self) -> AuthState {
        self.shared.snapshot.read().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.shared
            .snapshot
            .read()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub fn sign_in_config(&self) -> &ProviderConfig {
        &self.sign_in
    }

    /// Start a sign-in. Failures are logged, not returned.
    pub async fn login(&self) {
        if let Err(e) = self.provider.sign_in(&self.sign_in).await {
            warn!(provider = %self.sign_in.provider, error = %e, transient = e.is_transient(), "sign-in failed");
        }
    }

    /// Sign out, then go to the landing page whatever the outcome.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "sign-out failed");
        }
        self.navigator.navigate(Route::Landing);
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("state", &self.state())
            .field("subscribed", &self.subscription.lock().is_some())
            .finish_non_exhaustive()
    }
}
