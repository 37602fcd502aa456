//! Application state shared by every command.

use super::TerminalNavigator;
use crate::commands::{CliError, CliResult};
use app_config::{Config, Paths};
use auth_bridge::{
    guard, AuthContext, HttpAuditSink, ProviderConfig, Route, RouteDecision, SessionFileStore,
    SupabaseAuth, User,
};
use collection_sync::RowStore;
use std::sync::Arc;
use supabase_store::{
    AccessTokenSource, RealtimeClient, RealtimeConfig, SupabaseRestClient, SupabaseRowStore,
};
use tracing::{debug, info};

pub struct AppState {
    pub config: Config,
    pub paths: Paths,
    /// Supabase auth, kept concrete for redirect completion and refresh.
    pub auth: Arc<SupabaseAuth>,
    pub context: Arc<AuthContext>,
    pub realtime: Arc<RealtimeClient>,
    pub store: Arc<dyn RowStore>,
}

impl AppState {
    /// Wire auth, audit, REST and realtime from configuration.
    ///
    /// Must run inside the tokio runtime; the audit sink spawns onto it.
    pub fn build(config: Config, paths: Paths) -> CliResult<Self> {
        let auth = Arc::new(
            SupabaseAuth::new(&config.supabase_url, &config.supabase_publishable_key)
                .with_store(SessionFileStore::new(paths.session_file())),
        );

        let mut sign_in = ProviderConfig::new(&config.oauth_provider);
        if let Some(redirect_to) = &config.oauth_redirect_to {
            sign_in = sign_in.with_redirect_to(redirect_to);
        }

        let audit = Arc::new(HttpAuditSink::new(
            config.audit_endpoint(),
            tokio::runtime::Handle::current(),
        ));
        let context = Arc::new(AuthContext::init(
            auth.clone(),
            audit,
            Arc::new(TerminalNavigator),
            sign_in,
        ));
        debug!(state = %context.state().as_str(), "auth context ready");

        let tokens: Arc<dyn AccessTokenSource> = context.clone();
        let realtime_config =
            RealtimeConfig::for_project(&config.supabase_url, &config.supabase_publishable_key)?;
        let realtime = Arc::new(RealtimeClient::new(
            realtime_config,
            config.supabase_publishable_key.clone(),
            tokens.clone(),
        ));

        let rest = SupabaseRestClient::new(&config.supabase_url, &config.supabase_publishable_key);
        let store: Arc<dyn RowStore> =
            Arc::new(SupabaseRowStore::new(rest, realtime.clone(), tokens));

        info!(supabase_url = %config.supabase_url, "todo-feed initialized");

        Ok(Self {
            config,
            paths,
            auth,
            context,
            realtime,
            store,
        })
    }

    /// Guard `route` against the current identity and return the user.
    pub fn require(&self, route: Route) -> CliResult<User> {
        let user = self.context.user();
        match (guard(route, user.as_ref()), user) {
            (RouteDecision::Render, Some(user)) => Ok(user),
            (RouteDecision::Redirect { to, .. }, _) => Err(CliError::Redirected { from: route, to }),
            // Only protected routes are required, and those never render anonymously.
            (RouteDecision::Render, None) => Err(CliError::Redirected {
                from: route,
                to: Route::Landing,
            }),
        }
    }
}
