//! Durable storage for the session credential and last known user.

use serde::{Deserialize, Serialize};
use shared::models::UserRecord;
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use thiserror::Error;

/// Errors from a [`CredentialStore`].
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session storage I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The serialized subset of the session that survives restarts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
/// Bearer token.
    pub token: String,
/// Last known user, absent for token-only sessions.
    #[serde(default)]
    pub user: Option<UserRecord>,
}

impl fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedSession")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Key/value storage for the session, scoped to one backend origin.
///
/// Calls are synchronous so a write lands before the in-memory session
/// change becomes visible to anyone else.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored session, or `None` when nothing is stored.
    ///
    /// # Errors
    /// Returns an error when the storage cannot be read or holds garbage.
    fn read(&self) -> Result<Option<PersistedSession>, PersistenceError>;

    /// Replaces the stored session.
    ///
    /// # Errors
    /// Returns an error when the storage cannot be written.
    fn write(&self, session: &PersistedSession) -> Result<(), PersistenceError>;

    /// Removes the stored session. Clearing an empty store succeeds.
    ///
    /// # Errors
    /// Returns an error when the storage cannot be modified.
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// JSON file store, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store backed by the file at `path`; nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self) -> Result<Option<PersistedSession>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn write(&self, session: &PersistedSession) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }

        let payload = serde_json::to_vec_pretty(session)?;
        let staging = self.path.with_extension("json.tmp");
        // A leftover staging file would keep its old mode.
        match fs::remove_file(&staging) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(self.io_error(err)),
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&staging).map_err(|err| self.io_error(err))?;
        file.write_all(&payload)
            .and_then(|()| file.sync_all())
            .map_err(|err| self.io_error(err))?;
        drop(file);
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Process-local store for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<PersistedSession>>,
}

impl MemoryCredentialStore {
/// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `session`.
    #[must_use]
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }

    /// Current contents, for inspection.
    #[must_use]
    pub fn snapshot(&self) -> Option<PersistedSession> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self) -> Result<Option<PersistedSession>, PersistenceError> {
        Ok(self.snapshot())
    }

    fn write(&self, session: &PersistedSession) -> Result<(), PersistenceError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
