//! In-process row store.
//!
//! Writes do not notify listeners immediately: each write queues the change
//! event it causes, and [`MemoryRowStore::deliver_pending`] dispatches the
//! queue in order. This keeps "write acknowledged" and "change applied" as
//! two separately observable steps, the same way the hosted backend behaves.

use crate::{
    ChangeHandler, ChangeKind, ChangePayload, Query, RowId, RowStore, StoreError, StoreResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use live_subscription::{ListenerRegistry, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::debug;

/// One write accepted by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Insert { table: String, fields: Value },
    Update { table: String, id: RowId, patch: Value },
    Delete { table: String, id: RowId },
}

struct Tables {
    rows: HashMap<String, Vec<Value>>,
    next_id: i64,
    epoch: DateTime<Utc>,
    tick: i64,
    pending: VecDeque<ChangePayload>,
    writes: Vec<WriteRecord>,
    fail_next_write: Option<StoreError>,
    refuse_subscriptions: HashSet<(String, ChangeKind)>,
}

impl Tables {
    fn next_created_at(&mut self) -> String {
        self.tick += 1;
        (self.epoch + Duration::milliseconds(self.tick)).to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn find(&self, table: &str, id: &RowId) -> Option<usize> {
        self.rows
            .get(table)?
            .iter()
            .position(|row| row_id(row).as_ref() == Some(id))
    }
}

fn row_id(row: &Value) -> Option<RowId> {
    serde_json::from_value(row.get("id")?.clone()).ok()
}

fn sort_key(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

type Registries = Mutex<HashMap<(String, ChangeKind), ListenerRegistry<ChangePayload>>>;

/// Row store kept in memory, with a manually driven event queue.
pub struct MemoryRowStore {
    tables: Mutex<Tables>,
    // A (table, kind) entry exists only while it has listeners.
    listeners: Arc<Registries>,
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                rows: HashMap::new(),
                next_id: 1,
                epoch: Utc::now(),
                tick: 0,
                pending: VecDeque::new(),
                writes: Vec::new(),
                fail_next_write: None,
                refuse_subscriptions: HashSet::new(),
            }),
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Put rows in place without recording writes or queueing events.
    /// Rows without an `id` get the next free integer id; non-objects are
    /// ignored.
    pub fn preload(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.lock();
        for row in rows {
            let Value::Object(mut object) = row else {
                continue;
            };
            if !object.contains_key("id") {
                object.insert("id".to_string(), Value::from(tables.next_id));
                tables.next_id += 1;
            }
            if !object.contains_key("created_at") {
                object.insert("created_at".to_string(), Value::from(tables.next_created_at()));
            }
            tables
                .rows
                .entry(table.to_string())
                .or_default()
                .push(Value::Object(object));
        }
    }

    /// Queue an arbitrary event, e.g. to reorder or replay deliveries.
    pub fn push_event(&self, payload: ChangePayload) {
        self.tables.lock().pending.push_back(payload);
    }

    pub fn pending_len(&self) -> usize {
        self.tables.lock().pending.len()
    }

    /// Dispatch every queued event in order; returns how many were
    /// delivered. Events queued by listeners during delivery are delivered
    /// in the same call.
    pub fn deliver_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.tables.lock().pending.pop_front();
            let Some(payload) = next else {
                break;
            };

            let registry = self
                .listeners
                .lock()
                .get(&(payload.table.clone(), payload.kind))
                .cloned();
            let notified = registry.map(|r| r.emit(&payload)).unwrap_or(0);
            debug!(table = %payload.table, kind = %payload.kind, notified, "delivered change event");
            delivered += 1;
        }
        delivered
    }

    /// Make the next write fail with `error`.
    pub fn fail_next_write(&self, error: StoreError) {
        self.tables.lock().fail_next_write = Some(error);
    }

    /// Make subscriptions to `kind` on `table` fail.
    pub fn refuse_subscription(&self, table: &str, kind: ChangeKind) {
        self.tables
            .lock()
            .refuse_subscriptions
            .insert((table.to_string(), kind));
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.tables.lock().writes.clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Live listeners for `kind` on `table`.
    pub fn listener_count(&self, table: &str, kind: ChangeKind) -> usize {
        self.listeners
            .lock()
            .get(&(table.to_string(), kind))
            .map(ListenerRegistry::len)
            .unwrap_or(0)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().values().map(ListenerRegistry::len).sum()
    }

    fn take_failure(tables: &mut Tables) -> StoreResult<()> {
        match tables.fail_next_write.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn query(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>> {
        let mut rows = self.rows(table);
        if let Some(order) = &query.order {
            rows.sort_by_key(|row| sort_key(row, &order.column));
            if !order.ascending {
                rows.reverse();
            }
        }
        Ok(rows)
    }

    fn on_change(
        &self,
        table: &str,
        kind: ChangeKind,
        handler: ChangeHandler,
    ) -> StoreResult<Subscription> {
        let key = (table.to_string(), kind);
        if self.tables.lock().refuse_subscriptions.contains(&key) {
            return Err(StoreError::Subscribe {
                table: table.to_string(),
                kind,
                reason: "refused by store".to_string(),
            });
        }

        // Register under the map lock so a concurrent release cannot prune
        // the entry between lookup and registration.
        let inner = self
            .listeners
            .lock()
            .entry(key.clone())
            .or_insert_with(|| ListenerRegistry::new(&format!("{}:{}", table, kind)))
            .register(handler);

        let label = inner.label().to_string();
        let registries: Weak<Registries> = Arc::downgrade(&self.listeners);
        Ok(Subscription::new(label, move || {
            inner.unsubscribe();
            if let Some(registries) = registries.upgrade() {
                let mut registries = registries.lock();
                if registries.get(&key).is_some_and(ListenerRegistry::is_empty) {
                    registries.remove(&key);
                }
            }
        }))
    }

    async fn insert(&self, table: &str, fields: Value) -> StoreResult<Value> {
        let mut tables = self.tables.lock();
        Self::take_failure(&mut tables)?;

        let mut object = match fields {
            Value::Object(object) => object,
            other => {
                return Err(StoreError::Rejected {
                    table: table.to_string(),
                    status: 400,
                    message: format!("expected an object, got {}", other),
                })
            }
        };
        tables.writes.push(WriteRecord::Insert {
            table: table.to_string(),
            fields: Value::Object(object.clone()),
        });
        let id = tables.next_id;
        tables.next_id += 1;
        object.insert("id".to_string(), Value::from(id));
        let created_at = tables.next_created_at();
        object.insert("created_at".to_string(), Value::from(created_at));

        let row = Value::Object(object);
        tables
            .rows
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        tables.pending.push_back(ChangePayload::insert(table, row.clone()));
        Ok(row)
    }

    async fn update(&self, table: &str, id: &RowId, patch: Value) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        Self::take_failure(&mut tables)?;
        tables.writes.push(WriteRecord::Update {
            table: table.to_string(),
            id: id.clone(),
            patch: patch.clone(),
        });

        let Some(index) = tables.find(table, id) else {
            return Ok(());
        };
        let Some(rows) = tables.rows.get_mut(table) else {
            return Ok(());
        };
        if let (Value::Object(row), Value::Object(fields)) = (&mut rows[index], patch) {
            for (key, value) in fields {
                if key != "id" {
                    row.insert(key, value);
                }
            }
        }
        let record = rows[index].clone();
        tables.pending.push_back(ChangePayload::update(table, record));
        Ok(())
    }

    async fn delete(&self, table: &str, id: &RowId) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        Self::take_failure(&mut tables)?;
        tables.writes.push(WriteRecord::Delete {
            table: table.to_string(),
            id: id.clone(),
        });

        let Some(index) = tables.find(table, id) else {
            return Ok(());
        };
        let Some(rows) = tables.rows.get_mut(table) else {
            return Ok(());
        };
        let removed = rows.remove(index);
        let key = removed.get("id").cloned().unwrap_or(Value::Null);
        let old_record = serde_json::json!({ "id": key });
        tables.pending.push_back(ChangePayload::delete(table, old_record));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_insert_queues_event_until_delivered() {
        let store = MemoryRowStore::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let seen = seen.clone();
            store
                .on_change(
                    "posts",
                    ChangeKind::Insert,
                    Arc::new(move |_: &ChangePayload| {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap()
        };

        let row = store.insert("posts", json!({ "content": "hi" })).await.unwrap();
        assert_eq!(row["id"], 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(store.pending_len(), 1);

        assert_eq!(store.deliver_pending(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_orders_by_creation() {
        let store = MemoryRowStore::new();
        store.insert("todos", json!({ "text": "first" })).await.unwrap();
        store.insert("todos", json!({ "text": "second" })).await.unwrap();

        let rows = store.query("todos", &Query::by_creation()).await.unwrap();
        let texts: Vec<_> = rows.iter().map(|r| r["text"].as_str().unwrap()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_emit_events() {
        let store = MemoryRowStore::new();
        store.preload("todos", vec![json!({ "id": 5, "text": "a", "isCompleted": false })]);

        store
            .update("todos", &RowId::new("5"), json!({ "isCompleted": true }))
            .await
            .unwrap();
        store.delete("todos", &RowId::new("5")).await.unwrap();
        store.delete("todos", &RowId::new("99")).await.unwrap();

        assert_eq!(store.pending_len(), 2);
        assert_eq!(store.writes().len(), 3);
        assert!(store.rows("todos").is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_write_fails_once() {
        let store = MemoryRowStore::new();
        store.fail_next_write(StoreError::Transport("offline".into()));

        assert!(store.insert("posts", json!({ "content": "a" })).await.is_err());
        assert!(store.insert("posts", json!({ "content": "b" })).await.is_ok());
        assert_eq!(store.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_insert_is_not_recorded() {
        let store = MemoryRowStore::new();

        let result = store.insert("posts", json!("just a string")).await;
        assert!(matches!(result, Err(StoreError::Rejected { status: 400, .. })));
        assert!(store.writes().is_empty());
        assert!(store.rows("posts").is_empty());
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn test_released_listeners_drop_their_registry() {
        let store = MemoryRowStore::new();
        let handler: ChangeHandler = Arc::new(|_: &ChangePayload| {});

        let first = store.on_change("todos", ChangeKind::Insert, handler.clone()).unwrap();
        let second = store.on_change("todos", ChangeKind::Insert, handler.clone()).unwrap();
        let other = store.on_change("posts", ChangeKind::Insert, handler).unwrap();
        assert_eq!(store.listeners.lock().len(), 2);

        first.unsubscribe();
        assert_eq!(store.listener_count("todos", ChangeKind::Insert), 1);
        assert_eq!(store.listeners.lock().len(), 2);

        drop(second);
        other.unsubscribe();
        assert!(store.listeners.lock().is_empty());
        assert_eq!(store.total_listeners(), 0);
    }

    #[test]
    fn test_refused_subscription() {
        let store = MemoryRowStore::new();
        store.refuse_subscription("todos", ChangeKind::Delete);

        let result = store.on_change("todos", ChangeKind::Delete, Arc::new(|_: &ChangePayload| {}));
        assert!(matches!(result, Err(StoreError::Subscribe { .. })));
        assert_eq!(store.total_listeners(), 0);
    }
}
