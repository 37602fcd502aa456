//! Phoenix channel frames used by Supabase realtime.

use collection_sync::{ChangeKind, ChangePayload};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";

/// Channel topic carrying changes for `table` in the public schema.
pub fn topic_for(table: &str) -> String {
    format!("realtime:public:{}", table)
}

/// A single frame on the realtime socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// What an inbound frame means to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Server reply to a join, leave or heartbeat.
    Reply {
        topic: String,
        ok: bool,
        response: Value,
    },
    Change {
        topic: String,
        payload: ChangePayload,
    },
    /// The server errored or closed the channel.
    ChannelDown { topic: String, event: String },
    /// Presence, system and other frames the client does not act on.
    Ignored(String),
}

impl PhoenixMessage {
    fn new(topic: impl Into<String>, event: &str, payload: Value, reference: u64) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    /// Join a table topic as the user owning `access_token`.
    pub fn join(topic: impl Into<String>, access_token: &str, reference: u64) -> Self {
        let mut message = Self::new(
            topic,
            EVENT_JOIN,
            json!({ "user_token": access_token }),
            reference,
        );
        message.join_ref = message.reference.clone();
        message
    }

    pub fn leave(topic: impl Into<String>, reference: u64) -> Self {
        Self::new(topic, EVENT_LEAVE, json!({}), reference)
    }

    pub fn heartbeat(reference: u64) -> Self {
        Self::new(PHOENIX_TOPIC, EVENT_HEARTBEAT, json!({}), reference)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Interpret the frame. Change frames whose payload does not decode are
    /// reported as an error.
    pub fn classify(&self) -> serde_json::Result<Inbound> {
        let event = self.event.as_str();

        if let Some(kind) = ChangeKind::parse(event) {
            let mut payload: ChangePayload = serde_json::from_value(self.payload.clone())?;
            // Frame event is authoritative over the payload's `type`.
            payload.kind = kind;
            return Ok(Inbound::Change {
                topic: self.topic.clone(),
                payload,
            });
        }

        Ok(match event {
            EVENT_REPLY => Inbound::Reply {
                topic: self.topic.clone(),
                ok: self.payload.get("status").and_then(Value::as_str) == Some("ok"),
                response: self
                    .payload
                    .get("response")
                    .cloned()
                    .unwrap_or(Value::Null),
            },
            EVENT_ERROR | EVENT_CLOSE => Inbound::ChannelDown {
                topic: self.topic.clone(),
                event: self.event.clone(),
            },
            other => Inbound::Ignored(other.to_string()),
        })
    }
}
