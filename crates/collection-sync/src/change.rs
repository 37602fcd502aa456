//! Row change events.

use crate::{Row, RowId, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Kind of row change a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change event as delivered by the backend.
///
/// `record` is the new row for inserts and updates; `old_record` carries at
/// least the primary key for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

impl ChangePayload {
    pub fn insert(table: &str, record: Value) -> Self {
        Self::new(ChangeKind::Insert, table, Some(record), None)
    }

    pub fn update(table: &str, record: Value) -> Self {
        Self::new(ChangeKind::Update, table, Some(record), None)
    }

    pub fn delete(table: &str, old_record: Value) -> Self {
        Self::new(ChangeKind::Delete, table, None, Some(old_record))
    }

    fn new(kind: ChangeKind, table: &str, record: Option<Value>, old_record: Option<Value>) -> Self {
        Self {
            kind,
            table: table.to_string(),
            record,
            old_record,
            commit_timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// Listener for change events of one table and kind.
pub type ChangeHandler = Arc<dyn Fn(&ChangePayload) + Send + Sync>;

/// A change event decoded for a concrete row type.
#[derive(Debug, Clone)]
pub enum RowChange<R: Row> {
    Insert(R),
    Update(R::Patch),
    Delete(RowId),
}

#[derive(Deserialize)]
struct KeyOnly {
    id: RowId,
}

impl<R: Row> RowChange<R> {
    pub fn decode(payload: &ChangePayload) -> StoreResult<Self> {
        let missing = |field: &str| {
            StoreError::MalformedEvent(format!(
                "{} event for {} has no {}",
                payload.kind, payload.table, field
            ))
        };

        match payload.kind {
            ChangeKind::Insert => {
                let record = payload.record.clone().ok_or_else(|| missing("record"))?;
                Ok(RowChange::Insert(serde_json::from_value(record)?))
            }
            ChangeKind::Update => {
                let record = payload.record.clone().ok_or_else(|| missing("record"))?;
                Ok(RowChange::Update(serde_json::from_value(record)?))
            }
            ChangeKind::Delete => {
                let old = payload
                    .old_record
                    .clone()
                    .ok_or_else(|| missing("old_record"))?;
                let key: KeyOnly = serde_json::from_value(old)?;
                Ok(RowChange::Delete(key.id))
            }
        }
    }
}
