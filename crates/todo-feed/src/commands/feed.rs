use super::{CliError, CliResult};
use crate::app::AppState;
use crate::render;
use auth_bridge::Route;
use collection_sync::{load_seed, FeedView, Post, SubmitOutcome};
use tracing::info;

pub async fn list(state: &AppState) -> CliResult<()> {
    state.require(Route::Feed)?;
    let posts = load_seed::<Post>(state.store.as_ref()).await?;
    print!("{}", render::posts(&posts));
    Ok(())
}

pub async fn post(state: &AppState, text: &str) -> CliResult<()> {
    state.require(Route::Feed)?;
    let view = FeedView::mount(state.store.clone(), Vec::new())?;
    view.set_draft(text);

    let outcome = view.submit().await;
    view.unmount();
    match outcome {
        SubmitOutcome::Sent => println!("Posted."),
        SubmitOutcome::Blank => println!("Nothing to post."),
        SubmitOutcome::Failed | SubmitOutcome::NoIdentity => {
            let error = view
                .last_error()
                .unwrap_or_else(|| "post was not sent".to_string());
            return Err(CliError::WriteFailed(error));
        }
    }
    Ok(())
}

/// Draw the feed and redraw on every new post until Ctrl-C.
pub async fn watch(state: &AppState) -> CliResult<()> {
    state.require(Route::Feed)?;
    let view = FeedView::load(state.store.clone()).await?;
    state.realtime.connect();

    let mut versions = view.watch();
    render::redraw("Feed", &render::posts(&view.posts()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                render::redraw("Feed", &render::posts(&view.posts()));
            }
            _ = &mut ctrl_c => break,
        }
    }

    let released = view.unmount();
    info!(released, "feed view unmounted");
    state.realtime.shutdown().await;
    Ok(())
}
