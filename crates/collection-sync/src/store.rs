//! Row store seam.

use crate::{ChangeHandler, ChangeKind, Row, RowId, StoreResult};
use async_trait::async_trait;
use live_subscription::Subscription;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOrder {
    pub column: String,
    pub ascending: bool,
}

/// Point-in-time query. Row visibility is decided by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub order: Option<QueryOrder>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    /// Oldest rows first.
    pub fn by_creation() -> Self {
        Self {
            order: Some(QueryOrder {
                column: "created_at".to_string(),
                ascending: true,
            }),
        }
    }
}

/// Hosted table storage with per-row change notifications.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn query(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>>;

    /// Register for `kind` events on `table` until the handle is released.
    fn on_change(
        &self,
        table: &str,
        kind: ChangeKind,
        handler: ChangeHandler,
    ) -> StoreResult<Subscription>;

    /// Insert a row and return it as stored.
    async fn insert(&self, table: &str, fields: Value) -> StoreResult<Value>;

    async fn update(&self, table: &str, id: &RowId, patch: Value) -> StoreResult<()>;

    async fn delete(&self, table: &str, id: &RowId) -> StoreResult<()>;
}

/// Fetch the initial rows of `R::TABLE`, oldest first.
pub async fn load_seed<R: Row>(store: &dyn RowStore) -> StoreResult<Vec<R>> {
    let values = store.query(R::TABLE, &Query::by_creation()).await?;
    debug!(table = R::TABLE, rows = values.len(), "seed loaded");

    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(Into::into))
        .collect()
}
