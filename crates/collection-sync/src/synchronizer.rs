//! Seed-plus-live-events collection synchronization.
//!
//! A [`CollectionSynchronizer`] starts from a seed snapshot and then applies
//! change events as the row store delivers them. Events are applied in
//! arrival order; inserts append without a duplicate check and live rows are
//! never re-sorted.

use crate::{
    ChangeHandler, ChangeKind, ChangePayload, Row, RowChange, RowId, RowPatch, RowStore,
    StoreResult,
};
use live_subscription::SubscriptionSet;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Ordered rows plus the pure apply operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R> {
    rows: Vec<R>,
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: Row> Collection<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn apply_insert(&mut self, row: R) {
        self.rows.push(row);
    }

    /// Returns false when no row has the patch's id.
    pub fn apply_update(&mut self, patch: &R::Patch) -> bool {
        match self.rows.iter_mut().find(|row| row.id() == patch.id()) {
            Some(row) => {
                row.merge(patch);
                true
            }
            None => false,
        }
    }

    /// Removes the first row with `id`. Returns false when there is none.
    pub fn apply_delete(&mut self, id: &RowId) -> bool {
        match self.rows.iter().position(|row| row.id() == id) {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }

    /// Apply a decoded change; returns whether the collection changed.
    pub fn apply(&mut self, change: RowChange<R>) -> bool {
        match change {
            RowChange::Insert(row) => {
                self.apply_insert(row);
                true
            }
            RowChange::Update(patch) => self.apply_update(&patch),
            RowChange::Delete(id) => self.apply_delete(&id),
        }
    }
}

struct SyncState<R> {
    collection: Mutex<Collection<R>>,
    version: watch::Sender<u64>,
}

impl<R: Row> SyncState<R> {
    fn bump(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    fn handle_payload(&self, payload: &ChangePayload) {
        let change = match RowChange::<R>::decode(payload) {
            Ok(change) => change,
            Err(e) => {
                warn!(table = R::TABLE, kind = %payload.kind, error = %e, "skipping undecodable change event");
                return;
            }
        };

        let changed = self.collection.lock().apply(change);
        if changed {
            self.bump();
        } else {
            debug!(table = R::TABLE, kind = %payload.kind, "change event matched no row");
        }
    }
}

/// Collection kept in step with a row store.
pub struct CollectionSynchronizer<R> {
    state: Arc<SyncState<R>>,
    subscriptions: Mutex<Option<SubscriptionSet>>,
}

impl<R: Row> Default for CollectionSynchronizer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Row> CollectionSynchronizer<R> {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: Arc::new(SyncState {
                collection: Mutex::new(Collection::default()),
                version,
            }),
            subscriptions: Mutex::new(None),
        }
    }

    /// Use `rows` as the collection, replacing whatever was there.
    pub fn seed(&self, rows: Vec<R>) {
        debug!(table = R::TABLE, rows = rows.len(), "seeding collection");
        *self.state.collection.lock() = Collection::new(rows);
        self.state.bump();
    }

    /// Subscribe to `kinds` on `R::TABLE`.
    ///
    /// If any registration fails, the ones already made are released before
    /// the error is returned. Activating an active synchronizer replaces its
    /// subscriptions.
    pub fn activate(&self, store: &dyn RowStore, kinds: &[ChangeKind]) -> StoreResult<()> {
        if self.is_active() {
            let released = self.deactivate();
            debug!(table = R::TABLE, released, "re-activating synchronizer");
        }

        let mut acquired = SubscriptionSet::new();
        for &kind in kinds {
            let state = self.state.clone();
            let handler: ChangeHandler =
                Arc::new(move |payload: &ChangePayload| state.handle_payload(payload));

            match store.on_change(R::TABLE, kind, handler) {
                Ok(subscription) => acquired.push(subscription),
                Err(e) => {
                    let released = acquired.release_all();
                    warn!(table = R::TABLE, %kind, released, error = %e, "activation failed");
                    return Err(e);
                }
            }
        }

        info!(table = R::TABLE, subscriptions = acquired.len(), "collection live");
        *self.subscriptions.lock() = Some(acquired);
        Ok(())
    }

    /// Release every subscription taken by `activate`. Returns how many were
    /// released; zero when not active.
    pub fn deactivate(&self) -> usize {
        let acquired = self.subscriptions.lock().take();
        match acquired {
            Some(set) => {
                let released = set.release_all();
                debug!(table = R::TABLE, released, "collection deactivated");
                released
            }
            None => 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscriptions.lock().is_some()
    }

    /// Apply a raw event directly, as a store listener would.
    pub fn handle_payload(&self, payload: &ChangePayload) {
        self.state.handle_payload(payload);
    }

    pub fn rows(&self) -> Vec<R> {
        self.state.collection.lock().rows().to_vec()
    }

    pub fn len(&self) -> usize {
        self.state.collection.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current version; bumped by the seed and by every change that
    /// mutated the collection.
    pub fn version(&self) -> u64 {
        *self.state.version.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.state.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Post, Todo};
    use serde_json::json;

    fn todo(id: i64, text: &str, done: bool) -> Todo {
        Todo {
            id: RowId::from(id),
            text: text.to_string(),
            is_completed: done,
        }
    }

    #[test]
    fn test_seed_keeps_order() {
        let sync = CollectionSynchronizer::<Todo>::new();
        sync.seed(vec![todo(1, "a", false), todo(2, "b", false)]);
        assert_eq!(sync.rows(), vec![todo(1, "a", false), todo(2, "b", false)]);
        assert_eq!(sync.version(), 1);
    }

    #[test]
    fn test_insert_appends_at_end() {
        let sync = CollectionSynchronizer::<Todo>::new();
        sync.seed(vec![todo(1, "a", false), todo(2, "b", false)]);

        sync.handle_payload(&ChangePayload::insert("todos", json!({ "id": 3, "text": "c" })));

        let rows = sync.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], todo(3, "c", false));
    }

    #[test]
    fn test_insert_does_not_deduplicate() {
        let mut collection = Collection::new(vec![todo(1, "a", false)]);
        collection.apply_insert(todo(1, "a", false));
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_update_merges_present_fields() {
        let sync = CollectionSynchronizer::<Todo>::new();
        sync.seed(vec![todo(5, "a", false)]);

        sync.handle_payload(&ChangePayload::update("todos", json!({ "id": 5, "isCompleted": true })));
        assert_eq!(sync.rows(), vec![todo(5, "a", true)]);

        let version = sync.version();
        sync.handle_payload(&ChangePayload::update("todos", json!({ "id": 9, "isCompleted": true })));
        assert_eq!(sync.rows(), vec![todo(5, "a", true)]);
        assert_eq!(sync.version(), version);
    }

    #[test]
    fn test_delete_removes_match_only() {
        let sync = CollectionSynchronizer::<Todo>::new();
        sync.seed(vec![todo(5, "a", false), todo(6, "b", false)]);

        sync.handle_payload(&ChangePayload::delete("todos", json!({ "id": 5 })));
        assert_eq!(sync.rows(), vec![todo(6, "b", false)]);

        sync.handle_payload(&ChangePayload::delete("todos", json!({ "id": 99 })));
        assert_eq!(sync.rows(), vec![todo(6, "b", false)]);
    }

    #[test]
    fn test_delete_then_update_leaves_row_absent() {
        let sync = CollectionSynchronizer::<Todo>::new();
        sync.seed(vec![todo(5, "a", false)]);

        sync.handle_payload(&ChangePayload::delete("todos", json!({ "id": 5 })));
        sync.handle_payload(&ChangePayload::update("todos", json!({ "id": 5, "isCompleted": true })));
        assert!(sync.is_empty());
    }

    #[test]
    fn test_undecodable_event_is_skipped() {
        let sync = CollectionSynchronizer::<Post>::new();
        sync.seed(vec![]);

        sync.handle_payload(&ChangePayload::insert("posts", json!({ "content": "no id" })));
        assert!(sync.is_empty());
        assert_eq!(sync.version(), 1);
    }

    #[tokio::test]
    async fn test_watch_sees_every_applied_change() {
        let sync = CollectionSynchronizer::<Post>::new();
        let mut rx = sync.watch();

        sync.seed(vec![]);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        sync.handle_payload(&ChangePayload::insert("posts", json!({ "id": 1, "content": "hi" })));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }
}
