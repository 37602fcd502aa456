//! Best-effort forwarding of session changes to the web app.
//!
//! Every session change observed by the [`AuthContext`](crate::AuthContext)
//! is reported as `{ "event": "...", "session": {...} | null }`. Recording
//! never blocks and never fails the caller: the HTTP sink hands the request to
//! the runtime and only logs the outcome.

use crate::{Session, SessionEvent};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

/// Payload posted for each session change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

/// Receiver of audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Posts records to `{web_app_url}/api/auth`.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
    runtime: tokio::runtime::Handle,
}

impl HttpAuditSink {
    pub fn new(endpoint: impl Into<String>, runtime: tokio::runtime::Handle) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, runtime)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            runtime,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for HttpAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuditSink")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AuditSink for HttpAuditSink {
    fn record(&self, record: AuditRecord) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        self.runtime.spawn(async move {
            let event = record.event;
            match client.post(&endpoint).json(&record).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%event, "auth audit record delivered");
                }
                Ok(response) => {
                    warn!(%event, status = %response.status(), "auth audit endpoint rejected record");
                }
                Err(e) => {
                    warn!(%event, error = %e, "failed to deliver auth audit record");
                }
            }
        });
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: AuditRecord) {}
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }
}
