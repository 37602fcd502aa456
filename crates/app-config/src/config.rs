//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://example.supabase.co",
};

/// Default Supabase publishable key (can be overridden at compile time via
/// SUPABASE_PUBLISHABLE_KEY env var).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY")
{
    Some(key) => key,
    None => "public-anon-key",
};

/// Web app that receives auth audit records on `/api/auth`.
pub const DEFAULT_WEB_APP_URL: &str = match option_env!("TODO_FEED_WEB_APP_URL") {
    Some(url) => url,
    None => "http://localhost:3000",
};

/// OAuth provider used by `login`.
pub const DEFAULT_OAUTH_PROVIDER: &str = "github";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// Base URL of the web app hosting the auth audit endpoint.
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
    /// OAuth provider passed to the hosted auth service.
    #[serde(default = "default_oauth_provider")]
    pub oauth_provider: String,
    /// Where the provider redirects after sign-in.
    #[serde(default)]
    pub oauth_redirect_to: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

fn default_oauth_provider() -> String {
    DEFAULT_OAUTH_PROVIDER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_publishable_key: default_supabase_publishable_key(),
            web_app_url: default_web_app_url(),
            oauth_provider: default_oauth_provider(),
            oauth_redirect_to: None,
        }
    }
}

impl Config {
    /// Load `config.json` if it exists, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| CoreError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from `TODO_FEED_*` variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(level) = get("TODO_FEED_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("TODO_FEED_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = get("TODO_FEED_SUPABASE_KEY") {
            self.supabase_publishable_key = key;
        }
        if let Some(url) = get("TODO_FEED_WEB_APP_URL") {
            self.web_app_url = url;
        }
    }

    /// Reject URLs that cannot be parsed and an empty provider name.
    pub fn validate(&self) -> CoreResult<()> {
        self.supabase_url()?;
        Url::parse(&self.web_app_url)?;
        if self.oauth_provider.trim().is_empty() {
            return Err(CoreError::Config("oauth_provider must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Endpoint receiving `{event, session}` audit records.
    pub fn audit_endpoint(&self) -> String {
        format!("{}/api/auth", self.web_app_url.trim_end_matches('/'))
    }
}
