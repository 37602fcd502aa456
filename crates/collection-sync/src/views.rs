//! The feed and todos views.
//!
//! Views never touch their collection when the user acts. A submitted post
//! or todo, a toggle and a delete are only writes; the collection changes
//! when the resulting change event comes back from the store.

use crate::{
    load_seed, ChangeKind, CollectionSynchronizer, NewPost, NewTodo, Post, Row, RowId, RowStore,
    StoreError, StoreResult, Todo,
};
use auth_bridge::AuthContext;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Result of submitting the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Draft was blank; nothing was written.
    Blank,
    /// Write accepted; the draft was cleared.
    Sent,
    /// Write failed; the draft was kept.
    Failed,
    /// No signed-in user to own the row; the draft was kept.
    NoIdentity,
}

/// Draft text and the last write error, shared by both views.
#[derive(Default)]
struct Composer {
    draft: Mutex<String>,
    last_error: Mutex<Option<String>>,
}

impl Composer {
    fn set_draft(&self, text: &str) {
        *self.draft.lock() = text.to_string();
    }

    fn draft(&self) -> String {
        self.draft.lock().clone()
    }

    fn clear_draft(&self) {
        self.draft.lock().clear();
    }

    fn fail(&self, table: &str, action: &str, error: &StoreError) {
        warn!(table, action, error = %error, "write failed");
        *self.last_error.lock() = Some(error.to_string());
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

/// Posts, oldest first, with live inserts.
pub struct FeedView {
    store: Arc<dyn RowStore>,
    sync: CollectionSynchronizer<Post>,
    composer: Composer,
}

impl FeedView {
    /// The feed only listens for new posts.
    pub const KINDS: &'static [ChangeKind] = &[ChangeKind::Insert];

    /// Seed the view and subscribe to new posts.
    pub fn mount(store: Arc<dyn RowStore>, seed: Vec<Post>) -> StoreResult<Self> {
        let sync = CollectionSynchronizer::new();
        sync.seed(seed);
        sync.activate(store.as_ref(), Self::KINDS)?;
        Ok(Self {
            store,
            sync,
            composer: Composer::default(),
        })
    }

    /// Load the seed from the store, then mount.
    pub async fn load(store: Arc<dyn RowStore>) -> StoreResult<Self> {
        let seed = load_seed::<Post>(store.as_ref()).await?;
        Self::mount(store, seed)
    }

    pub fn set_draft(&self, text: &str) {
        self.composer.set_draft(text);
    }

    pub fn draft(&self) -> String {
        self.composer.draft()
    }

    /// Insert the draft as a new post.
    pub async fn submit(&self) -> SubmitOutcome {
        let draft = self.composer.draft();
        if draft.trim().is_empty() {
            return SubmitOutcome::Blank;
        }

        let fields = match serde_json::to_value(NewPost { content: &draft }) {
            Ok(fields) => fields,
            Err(e) => {
                self.composer.fail(Post::TABLE, "insert", &e.into());
                return SubmitOutcome::Failed;
            }
        };

        match self.store.insert(Post::TABLE, fields).await {
            Ok(_) => {
                debug!("post submitted");
                self.composer.clear_draft();
                SubmitOutcome::Sent
            }
            Err(e) => {
                self.composer.fail(Post::TABLE, "insert", &e);
                SubmitOutcome::Failed
            }
        }
    }

    pub fn posts(&self) -> Vec<Post> {
        self.sync.rows()
    }

    pub fn last_error(&self) -> Option<String> {
        self.composer.last_error()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.sync.watch()
    }

    pub fn is_live(&self) -> bool {
        self.sync.is_active()
    }

    /// Release the view's subscriptions; returns how many were released.
    pub fn unmount(&self) -> usize {
        self.sync.deactivate()
    }
}

/// The signed-in user's todos with live inserts, updates and deletes.
pub struct TodosView {
    store: Arc<dyn RowStore>,
    auth: Arc<AuthContext>,
    sync: CollectionSynchronizer<Todo>,
    composer: Composer,
}

impl TodosView {
    pub const KINDS: &'static [ChangeKind] =
        &[ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

    pub fn mount(
        store: Arc<dyn RowStore>,
        auth: Arc<AuthContext>,
        seed: Vec<Todo>,
    ) -> StoreResult<Self> {
        let sync = CollectionSynchronizer::new();
        sync.seed(seed);
        sync.activate(store.as_ref(), Self::KINDS)?;
        Ok(Self {
            store,
            auth,
            sync,
            composer: Composer::default(),
        })
    }

    pub async fn load(store: Arc<dyn RowStore>, auth: Arc<AuthContext>) -> StoreResult<Self> {
        let seed = load_seed::<Todo>(store.as_ref()).await?;
        Self::mount(store, auth, seed)
    }

    pub fn set_draft(&self, text: &str) {
        self.composer.set_draft(text);
    }

    pub fn draft(&self) -> String {
        self.composer.draft()
    }

    /// Insert the draft as a todo owned by the signed-in user.
    pub async fn submit(&self) -> SubmitOutcome {
        let draft = self.composer.draft();
        if draft.trim().is_empty() {
            return SubmitOutcome::Blank;
        }

        let Some(user) = self.auth.user() else {
            warn!("cannot add a todo without a signed-in user");
            return SubmitOutcome::NoIdentity;
        };

        let fields = match serde_json::to_value(NewTodo {
            user_id: &user.id,
            text: &draft,
        }) {
            Ok(fields) => fields,
            Err(e) => {
                self.composer.fail(Todo::TABLE, "insert", &e.into());
                return SubmitOutcome::Failed;
            }
        };

        match self.store.insert(Todo::TABLE, fields).await {
            Ok(_) => {
                self.composer.clear_draft();
                SubmitOutcome::Sent
            }
            Err(e) => {
                self.composer.fail(Todo::TABLE, "insert", &e);
                SubmitOutcome::Failed
            }
        }
    }

    /// Set `isCompleted` on a todo.
    pub async fn toggle(&self, id: &RowId, completed: bool) {
        let patch = serde_json::json!({ "isCompleted": completed });
        if let Err(e) = self.store.update(Todo::TABLE, id, patch).await {
            self.composer.fail(Todo::TABLE, "update", &e);
        }
    }

    pub async fn delete(&self, id: &RowId) {
        if let Err(e) = self.store.delete(Todo::TABLE, id).await {
            self.composer.fail(Todo::TABLE, "delete", &e);
        }
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.sync.rows()
    }

    pub fn last_error(&self) -> Option<String> {
        self.composer.last_error()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.sync.watch()
    }

    pub fn is_live(&self) -> bool {
        self.sync.is_active()
    }

    pub fn unmount(&self) -> usize {
        self.sync.deactivate()
    }
}
