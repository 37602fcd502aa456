//! Sign-in, sign-out, status and refresh.

use super::{CliError, CliResult};
use crate::app::AppState;
use crate::render;
use tracing::info;

/// Without `redirect_url`, print the provider's authorize URL. With it,
/// finish the sign-in from the tokens the provider sent back.
pub async fn login(state: &AppState, redirect_url: Option<String>) -> CliResult<()> {
    match redirect_url {
        Some(redirect_url) => {
            let session = state.auth.complete_sign_in(&redirect_url).await?;
            info!(user_id = %session.user.id, "login completed");
            let who = session.user.email.as_deref().unwrap_or(&session.user.id);
            println!("Signed in as {}", who);
        }
        None => {
            state.context.login().await;
            let url = state
                .auth
                .pending_authorize_url()
                .ok_or(CliError::SignInFailed)?;
            println!(
                "Sign in with {} at:\n\n  {}\n",
                state.context.sign_in_config().provider,
                url
            );
            println!("Then run: todo-feed login --redirect-url '<URL you were sent back to>'");
        }
    }
    Ok(())
}

pub async fn logout(state: &AppState) {
    state.context.logout().await;
    println!("Signed out.");
}

pub fn status(state: &AppState) {
    print!("{}", render::status(&state.context.snapshot()));
    println!("project: {}", state.config.supabase_url);
    println!("session: {}", state.paths.session_file().display());
}

pub async fn refresh(state: &AppState) -> CliResult<()> {
    let session = state.auth.refresh_session().await?;
    info!(user_id = %session.user.id, "session refreshed");
    print!("{}", render::status(&state.context.snapshot()));
    Ok(())
}
