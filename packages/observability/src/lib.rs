//! # Observability
//!
//! Logging setup for the todo-feed binaries.
//!
//! Binaries call [`init_with_config`] once at startup and then use plain
//! `tracing` macros everywhere. Library crates never install a subscriber;
//! they only emit events.
//!
//! Every event is written as one JSON object per line to a log file
//! (`~/.todo-feed/logs/dev.jsonl` unless overridden):
//!
//! - `tail -f ~/.todo-feed/logs/dev.jsonl | jq` for pretty JSON
//! - `lnav ~/.todo-feed/logs/dev.jsonl` for interactive exploration
//!
//! An optional compact stderr layer gives immediate feedback in a terminal.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "todo-feed".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod file_sink;
mod json_layer;

use std::path::PathBuf;

pub use file_sink::{default_log_path, FileLogWriter};
pub use json_layer::{JsonLayer, LogEntry};

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Stamped on every line as `service`.
    pub service_name: String,

    /// Filter used when `RUST_LOG` is unset, e.g. `"info"` or `"todo_feed=debug"`.
    pub default_level: String,

    /// JSONL destination; `None` means [`default_log_path`].
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr in compact form.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "todo-feed".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Falls back to stderr-only output when the log file cannot be opened, so a
/// read-only home directory never prevents the program from starting.
pub fn init_with_config(config: LogConfig) {
    file_sink::init_subscriber(&config);
}
