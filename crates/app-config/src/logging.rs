//! Logging initialization.
//!
//! Thin wrapper over the observability package: structured JSONL goes to
//! `~/.todo-feed/logs/dev.jsonl`, with an optional stderr copy.

use crate::Paths;
use observability::LogConfig;

/// Initialize logging for the CLI.
///
/// `RUST_LOG` wins over `level`. Setting `TODO_FEED_LOG_STDERR=1` mirrors the
/// log stream to stderr.
pub fn init_logging(level: &str, paths: &Paths) {
    let also_stderr = std::env::var("TODO_FEED_LOG_STDERR")
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: "todo-feed".into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}
