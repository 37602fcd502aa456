//! Session persistence between CLI invocations.

use crate::{AuthResult, Session};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON file holding the last session.
#[derive(Debug, Clone)]
pub struct SessionFileStore {
    path: PathBuf,
}

impl SessionFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when nothing was persisted.
    pub fn load(&self) -> AuthResult<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;

        // Tokens are never readable by others, not even briefly: write a
        // private temp file, then rename it over the old one.
        let tmp_path = self.path.with_extension("json.tmp");
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path)?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    pub fn clear(&self) -> AuthResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!(path = %self.path.display(), "session cleared");
        }
        Ok(())
    }
}
