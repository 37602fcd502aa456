//! Log file output.
//!
//! Appends JSONL to a single file; each line is flushed as soon as it is
//! written so `tail -f` sees it immediately.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// `~/.todo-feed/logs/dev.jsonl`, or `./.todo-feed/logs/dev.jsonl` when no
/// home directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".todo-feed")
        .join("logs")
        .join("dev.jsonl")
}

/// Shared append-only writer for the log file.
#[derive(Clone)]
pub struct FileLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl FileLogWriter {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl io::Write for FileLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for FileLogWriter {
    type Writer = FileLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber: JSONL file layer plus optional stderr.
pub(crate) fn init_subscriber(config: &LogConfig) {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let file_layer = match FileLogWriter::open(&log_path) {
        Ok(writer) => Some(
            JsonLayer::new(config.service_name.clone(), writer)
                .with_filter(env_filter(&config.default_level)),
        ),
        Err(e) => {
            eprintln!("could not open log file {}: {}", log_path.display(), e);
            None
        }
    };

    // Without a file the stderr layer is the only output, so force it on.
    let stderr_layer = if config.also_stderr || file_layer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    if installed.is_ok() {
        tracing::debug!(
            service = %config.service_name,
            log_path = %log_path.display(),
            "logging initialized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::tempdir;

    #[test]
    fn test_writer_creates_parent_dirs_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("test.jsonl");

        let mut writer = FileLogWriter::open(&path).unwrap();
        writer.write_all(b"first\n").unwrap();
        drop(writer);

        let mut writer = FileLogWriter::open(&path).unwrap();
        writer.write_all(b"second\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_default_log_path_location() {
        let path = default_log_path();
        assert!(path.ends_with(".todo-feed/logs/dev.jsonl"));
    }
}
