//! Row types for the `posts` and `todos` tables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Row identity. The backend may send integer or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<i64> for RowId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Int(i64),
            Str(String),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Int(id) => RowId::from(id),
            Wire::Str(id) => RowId(id),
        })
    }
}

/// A table row that can be kept in a collection.
pub trait Row: Clone + fmt::Debug + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    /// Partial row carried by update events.
    type Patch: RowPatch;

    fn id(&self) -> &RowId;

    /// Overwrite the fields present in `patch`.
    fn merge(&mut self, patch: &Self::Patch);
}

pub trait RowPatch: fmt::Debug + DeserializeOwned + Send + 'static {
    fn id(&self) -> &RowId;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: RowId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostPatch {
    pub id: RowId,
    #[serde(default)]
    pub content: Option<String>,
}

impl Row for Post {
    const TABLE: &'static str = "posts";
    type Patch = PostPatch;

    fn id(&self) -> &RowId {
        &self.id
    }

    fn merge(&mut self, patch: &PostPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
    }
}

impl RowPatch for PostPatch {
    fn id(&self) -> &RowId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: RowId,
    pub text: String,
    #[serde(rename = "isCompleted", default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
    pub id: RowId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "isCompleted", default)]
    pub is_completed: Option<bool>,
}

impl Row for Todo {
    const TABLE: &'static str = "todos";
    type Patch = TodoPatch;

    fn id(&self) -> &RowId {
        &self.id
    }

    fn merge(&mut self, patch: &TodoPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = is_completed;
        }
    }
}

impl RowPatch for TodoPatch {
    fn id(&self) -> &RowId {
        &self.id
    }
}

/// Insert payload for `posts`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost<'a> {
    pub content: &'a str,
}

/// Insert payload for `todos`.
#[derive(Debug, Clone, Serialize)]
pub struct NewTodo<'a> {
    pub user_id: &'a str,
    pub text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id_accepts_numbers_and_strings() {
        let from_int: RowId = serde_json::from_value(json!(42)).unwrap();
        let from_str: RowId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int.to_string(), "42");
    }

    #[test]
    fn test_todo_wire_names_and_extra_columns() {
        let todo: Todo = serde_json::from_value(json!({
            "id": 5,
            "text": "buy milk",
            "isCompleted": true,
            "user_id": "u-1",
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(todo.id, RowId::new("5"));
        assert!(todo.is_completed);

        let value = serde_json::to_value(&todo).unwrap();
        assert_eq!(value["isCompleted"], true);
        assert_eq!(value["id"], "5");
    }

    #[test]
    fn test_todo_patch_only_has_present_fields() {
        let patch: TodoPatch =
            serde_json::from_value(json!({ "id": 5, "isCompleted": true })).unwrap();
        assert_eq!(patch.text, None);

        let mut todo = Todo {
            id: RowId::new("5"),
            text: "a".into(),
            is_completed: false,
        };
        todo.merge(&patch);
        assert_eq!(todo.text, "a");
        assert!(todo.is_completed);
    }

    #[test]
    fn test_post_merge() {
        let mut post = Post {
            id: RowId::new("1"),
            content: "old".into(),
        };
        post.merge(&PostPatch {
            id: RowId::new("1"),
            content: Some("new".into()),
        });
        assert_eq!(post.content, "new");
    }

    #[test]
    fn test_insert_payloads() {
        assert_eq!(
            serde_json::to_value(NewTodo {
                user_id: "u-1",
                text: "write tests"
            })
            .unwrap(),
            json!({ "user_id": "u-1", "text": "write tests" })
        );
        assert_eq!(
            serde_json::to_value(NewPost { content: "hello" }).unwrap(),
            json!({ "content": "hello" })
        );
    }
}
