//! Persisted identity of the current stream.
//!
//! A single key survives process restarts so that `start` can resume the
//! stream created by an earlier run instead of opening a new one.

use crate::peer::types::SessionId;
use directories::BaseDirs;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key under which the stream id is persisted
pub const SESSION_KEY: &str = "streamId";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("unable to determine home directory")]
    NoHomeDir,
    #[error("session store io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("session store at {path:?} is corrupt: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Option<SessionId>, StoreError>;
    fn set(&self, id: &SessionId) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Durable store backed by a small JSON key-value file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.avatar-stream/session.json`
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let base = BaseDirs::new().ok_or(StoreError::NoHomeDir)?;
        Ok(base.home_dir().join(".avatar-stream").join("session.json"))
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| self.io_err(err))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(self.io_err(err)),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_err(err))?;
        }
        let serialized = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })?;

        // Written next to the target and renamed over it, so readers never see a partial file.
        let tmp_path = self.path.with_extension("json.tmp");
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp_path).map_err(|err| self.io_err(err))?;
        file.write_all(&serialized).map_err(|err| self.io_err(err))?;
        file.sync_all().map_err(|err| self.io_err(err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // a stale tmp file keeps whatever mode it was created with
            let mut perms = file.metadata().map_err(|err| self.io_err(err))?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&tmp_path, perms).map_err(|err| self.io_err(err))?;
        }
        drop(file);
        fs::rename(&tmp_path, &self.path).map_err(|err| self.io_err(err))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Option<SessionId>, StoreError> {
        let entries = self.load()?;
        Ok(entries
            .get(SESSION_KEY)
            .filter(|id| !id.is_empty())
            .map(|id| SessionId::new(id.as_str())))
    }

    fn set(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(SESSION_KEY.to_string(), id.as_str().to_string());
        self.save(&entries)?;
        debug!(path = ?self.path, session_id = %id, "persisted session id");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        if entries.remove(SESSION_KEY).is_some() {
            self.save(&entries)?;
            debug!(path = ?self.path, "cleared persisted session id");
        }
        Ok(())
    }
}

/// Non-durable store for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    current: Mutex<Option<SessionId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<SessionId>) -> Self {
        Self {
            current: Mutex::new(Some(id.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Option<SessionId>, StoreError> {
        Ok(self.current.lock().clone())
    }

    fn set(&self, id: &SessionId) -> Result<(), StoreError> {
        *self.current.lock() = Some(id.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.current.lock() = None;
        Ok(())
    }
}
