//! Session provider backed by Supabase Auth (GoTrue).
//!
//! Sign-in is delegated to the hosted OAuth flow: [`SupabaseAuth::sign_in`]
//! only builds the authorize URL, and the redirect the browser lands on is
//! handed back through [`SupabaseAuth::complete_sign_in`]. Every session
//! change is persisted to the [`SessionFileStore`] (when one is configured)
//! and then emitted to listeners.

use crate::{
    AuthError, AuthResult, ProviderConfig, Session, SessionChange, SessionEvent,
    SessionFileStore, SessionHandler, SessionProvider, User,
};
use async_trait::async_trait;
use live_subscription::{ListenerRegistry, Subscription};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Supabase Auth client and session holder.
pub struct SupabaseAuth {
    http_client: Client,
    supabase_url: String,
    publishable_key: String,
    session: RwLock<Option<Session>>,
    listeners: ListenerRegistry<SessionChange>,
    store: Option<SessionFileStore>,
    pending_authorize_url: Mutex<Option<String>>,
}

impl SupabaseAuth {
    pub fn new(supabase_url: &str, publishable_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
            session: RwLock::new(None),
            listeners: ListenerRegistry::new("supabase-auth"),
            store: None,
            pending_authorize_url: Mutex::new(None),
        }
    }

    /// Persist sessions to `store` and restore the one saved there.
    ///
    /// An unreadable session file is discarded.
    pub fn with_store(mut self, store: SessionFileStore) -> Self {
        match store.load() {
            Ok(Some(session)) => {
                debug!(user_id = %session.user.id, "loaded persisted session");
                *self.session.get_mut() = Some(session);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "discarding unreadable session file");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to remove session file");
                }
            }
        }
        self.store = Some(store);
        self
    }

    pub fn supabase_url(&self) -> &str {
        &self.supabase_url
    }

    pub fn publishable_key(&self) -> &str {
        &self.publishable_key
    }

    /// URL the user opens to authenticate with the OAuth provider.
    pub fn authorize_url(&self, config: &ProviderConfig) -> AuthResult<Url> {
        if config.provider.trim().is_empty() {
            return Err(AuthError::Config("OAuth provider must not be empty".to_string()));
        }

        let mut url = Url::parse(&format!("{}/auth/v1/authorize", self.supabase_url))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", &config.provider);
            if let Some(redirect_to) = &config.redirect_to {
                query.append_pair("redirect_to", redirect_to);
            }
            if let Some(scopes) = &config.scopes {
                query.append_pair("scopes", scopes);
            }
        }
        Ok(url)
    }

    /// Authorize URL produced by the last `sign_in`.
    pub fn pending_authorize_url(&self) -> Option<String> {
        self.pending_authorize_url.lock().clone()
    }

    /// Finish the OAuth flow from the URL the provider redirected to.
    pub async fn complete_sign_in(&self, redirect_url: &str) -> AuthResult<Session> {
        let params = parse_redirect(redirect_url)?;

        let access_token = params
            .get("access_token")
            .cloned()
            .ok_or_else(|| AuthError::OAuth("redirect is missing access_token".to_string()))?;
        let refresh_token = params
            .get("refresh_token")
            .cloned()
            .ok_or_else(|| AuthError::OAuth("redirect is missing refresh_token".to_string()))?;

        let user = self.fetch_user(&access_token).await?;
        let session = Session {
            access_token,
            refresh_token,
            expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
            expires_at: params.get("expires_at").and_then(|v| v.parse().ok()),
            token_type: params
                .get("token_type")
                .cloned()
                .unwrap_or_else(|| "bearer".to_string()),
            user,
        }
        .with_computed_expiry();

        info!(user_id = %session.user.id, "sign-in completed");
        self.pending_authorize_url.lock().take();
        self.replace_session(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Verify an access token with `/auth/v1/user`.
    pub async fn fetch_user(&self, access_token: &str) -> AuthResult<User> {
        let user_url = format!("{}/auth/v1/user", self.supabase_url);
        debug!(url = %user_url, "Verifying session with Supabase");

        let response = self
            .http_client
            .get(&user_url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Session verification failed");
            return Err(AuthError::SessionInvalid(format!(
                "Server rejected session: HTTP {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    /// Exchange the refresh token for a new session.
    pub async fn refresh_session(&self) -> AuthResult<Session> {
        let refresh_token = self
            .session
            .read()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NotLoggedIn)?;

        let refresh_url = format!(
            "{}/auth/v1/token?grant_type=refresh_token",
            self.supabase_url
        );
        debug!(url = %refresh_url, "Refreshing token");

        let response = self
            .http_client
            .post(&refresh_url)
            .header("apikey", &self.publishable_key)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Token refresh failed");
            return Err(AuthError::TokenRefresh(format!("HTTP {}: {}", status, body)));
        }

        let session: Session = response.json().await?;
        let session = session.with_computed_expiry();
        info!(user_id = %session.user.id, "Token refreshed successfully");

        self.replace_session(SessionEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    /// Store, persist and announce a new session.
    fn replace_session(&self, event: SessionEvent, session: Option<Session>) {
        *self.session.write() = session.clone();

        if let Some(store) = &self.store {
            let persisted = match &session {
                Some(session) => store.save(session),
                None => store.clear(),
            };
            if let Err(e) = persisted {
                warn!(error = %e, "failed to persist session");
            }
        }

        let notified = self.listeners.emit(&SessionChange::new(event, session));
        debug!(%event, listeners = notified, "session change emitted");
    }
}

impl std::fmt::Debug for SupabaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseAuth")
            .field("supabase_url", &self.supabase_url)
            .field("signed_in", &self.session.read().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionProvider for SupabaseAuth {
    fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    fn on_session_change(&self, handler: SessionHandler) -> Subscription {
        self.listeners.register(handler)
    }

    async fn sign_in(&self, config: &ProviderConfig) -> AuthResult<()> {
        let url = self.authorize_url(config)?;
        info!(provider = %config.provider, url = %url, "open this URL to sign in");
        *self.pending_authorize_url.lock() = Some(url.into());
        Ok(())
    }

    /// Revoke the session remotely, then clear it locally regardless of the
    /// remote outcome.
    async fn sign_out(&self) -> AuthResult<()> {
        let access_token = self.session.read().as_ref().map(|s| s.access_token.clone());

        let remote = match access_token {
            Some(token) => self.revoke(&token).await,
            None => Ok(()),
        };

        self.replace_session(SessionEvent::SignedOut, None);
        remote
    }
}

impl SupabaseAuth {
    async fn revoke(&self, access_token: &str) -> AuthResult<()> {
        let logout_url = format!("{}/auth/v1/logout", self.supabase_url);
        let response = self
            .http_client
            .post(&logout_url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::SessionInvalid(format!(
                "logout rejected: HTTP {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

/// Parameters from a redirect URL: the fragment for the implicit flow, the
/// query otherwise.
fn parse_redirect(redirect_url: &str) -> AuthResult<HashMap<String, String>> {
    let url = Url::parse(redirect_url)?;
    let raw = match url.fragment() {
        Some(fragment) if !fragment.is_empty() => fragment.to_string(),
        _ => url.query().unwrap_or_default().to_string(),
    };

    let params: HashMap<String, String> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        let description = params
            .get("error_description")
            .map(String::as_str)
            .unwrap_or("no description");
        return Err(AuthError::OAuth(format!("{}: {}", error, description)));
    }

    Ok(params)
}
