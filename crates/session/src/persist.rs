//! Persistence adapter contract and provided adapters
//!
//! The session persists exactly one opaque string blob under a fixed key.
//! Which backing store holds it is the consuming application's decision, so
//! the contract is a small object-safe trait injected at construction.
//! A missing value is `None`, never an error.
//!
//! Three adapters ship with the crate:
//! - `MemoryPersistence` — process-local, for tests and volatile sessions
//! - `FilePersistence` — JSON map file with atomic writes, the durable choice
//! - `NoopPersistence` — the degraded mode used when no adapter is configured

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{Error, Result};

/// Boxed future returned by adapter methods (dyn-compatibility behind
/// `Arc<dyn Persistence>`).
pub type PersistFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Async get/set/clear of a single opaque string blob by key.
pub trait Persistence: Send + Sync {
    /// Read the blob stored under `key`, or `None` if absent.
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<String>>;

    /// Store `value` under `key`, replacing any previous blob.
    fn set<'a>(&'a self, key: &'a str, value: String) -> PersistFuture<'a, ()>;

    /// Remove the blob stored under `key`. Removing an absent key is not an
    /// error.
    fn clear<'a>(&'a self, key: &'a str) -> PersistFuture<'a, ()>;
}

/// Process-local adapter backed by a map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a value, e.g. a persisted credential blob in tests.
    pub fn seeded(key: &str, value: String) -> Self {
        let store = Self::new();
        store
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        store
    }
}

impl Persistence for MemoryPersistence {
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<String>> {
        Box::pin(async move {
            let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            Ok(entries.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> PersistFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn clear<'a>(&'a self, key: &'a str) -> PersistFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.remove(key);
            Ok(())
        })
    }
}

/// File-backed adapter: a JSON object mapping keys to blobs.
///
/// All writes are read-modify-write under a tokio mutex and land via atomic
/// temp-file + rename so a crash mid-write cannot corrupt the stored session.
/// The file is created 0600 since it holds tokens.
pub struct FilePersistence {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FilePersistence {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| Error::Persistence(format!("parsing session file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::Persistence(format!("reading session file: {e}"))),
        }
    }
}

impl Persistence for FilePersistence {
    fn get<'a>(&'a self, key: &'a str) -> PersistFuture<'a, Option<String>> {
        Box::pin(async move {
            let map = self.read_map().await?;
            Ok(map.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> PersistFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut map = self.read_map().await?;
            map.insert(key.to_string(), value);
            write_atomic(&self.path, &map).await
        })
    }

    fn clear<'a>(&'a self, key: &'a str) -> PersistFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut map = self.read_map().await?;
            if map.remove(key).is_some() {
                write_atomic(&self.path, &map).await?;
            }
            Ok(())
        })
    }
}

/// No-op adapter: reads find nothing, writes vanish.
///
/// Installed by `Session::new` when the caller provides no adapter; the
/// session warns once that logins will not survive restarts and signout will
/// not clear storage.
#[derive(Debug, Default)]
pub struct NoopPersistence;

impl Persistence for NoopPersistence {
    fn get<'a>(&'a self, _key: &'a str) -> PersistFuture<'a, Option<String>> {
        Box::pin(async { Ok(None) })
    }

    fn set<'a>(&'a self, _key: &'a str, _value: String) -> PersistFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn clear<'a>(&'a self, _key: &'a str) -> PersistFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Write the key→blob map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets 0600 permissions (unix) since the file contains tokens.
async fn write_atomic(path: &Path, map: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(map)
        .map_err(|e| Error::Persistence(format!("serializing session file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Persistence("session file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Persistence(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Persistence(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Persistence(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session blob");
    Ok(())
}
