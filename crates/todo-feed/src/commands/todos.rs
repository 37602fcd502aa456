//! The signed-in user's todos.

use super::{CliError, CliResult};
use crate::app::AppState;
use crate::render;
use auth_bridge::Route;
use collection_sync::{load_seed, RowId, SubmitOutcome, Todo, TodosView};
use tracing::info;

pub async fn list(state: &AppState) -> CliResult<()> {
    state.require(Route::Todos)?;
    let todos = load_seed::<Todo>(state.store.as_ref()).await?;
    print!("{}", render::todos(&todos));
    Ok(())
}

/// Mount without a seed: writes only, the collection is not shown.
fn mount_for_write(state: &AppState) -> CliResult<TodosView> {
    state.require(Route::Todos)?;
    Ok(TodosView::mount(
        state.store.clone(),
        state.context.clone(),
        Vec::new(),
    )?)
}

fn finish(view: &TodosView) -> CliResult<()> {
    view.unmount();
    match view.last_error() {
        Some(error) => Err(CliError::WriteFailed(error)),
        None => Ok(()),
    }
}

pub async fn add(state: &AppState, text: &str) -> CliResult<()> {
    let view = mount_for_write(state)?;
    view.set_draft(text);

    match view.submit().await {
        SubmitOutcome::Sent => println!("Added."),
        SubmitOutcome::Blank => println!("Nothing to add."),
        SubmitOutcome::NoIdentity => {
            view.unmount();
            return Err(CliError::Redirected {
                from: Route::Todos,
                to: Route::Landing,
            });
        }
        SubmitOutcome::Failed => {}
    }
    finish(&view)
}

pub async fn toggle(state: &AppState, id: &str, completed: bool) -> CliResult<()> {
    let view = mount_for_write(state)?;
    view.toggle(&RowId::new(id), completed).await;
    finish(&view)?;
    println!("Marked {} as {}.", id, if completed { "done" } else { "not done" });
    Ok(())
}

pub async fn delete(state: &AppState, id: &str) -> CliResult<()> {
    let view = mount_for_write(state)?;
    view.delete(&RowId::new(id)).await;
    finish(&view)?;
    println!("Deleted {}.", id);
    Ok(())
}

/// Draw the todos and redraw on every change until Ctrl-C.
pub async fn watch(state: &AppState) -> CliResult<()> {
    state.require(Route::Todos)?;
    let view = TodosView::load(state.store.clone(), state.context.clone()).await?;
    state.realtime.connect();

    let mut versions = view.watch();
    render::redraw("Todos", &render::todos(&view.todos()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                render::redraw("Todos", &render::todos(&view.todos()));
            }
            _ = &mut ctrl_c => break,
        }
    }

    let released = view.unmount();
    info!(released, "todos view unmounted");
    state.realtime.shutdown().await;
    Ok(())
}
