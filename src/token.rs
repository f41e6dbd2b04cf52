//! Durable storage for the session credential.
//!
//! Exactly one opaque token is persisted; absence means unauthenticated.
//! The store is injected into [`SessionClient`](crate::session::SessionClient)
//! so token persistence stays decoupled from HTTP logic and tests can swap
//! in a memory-backed double.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const TOKEN_FILE: &str = "token";

/// Key/value persistence for one opaque credential.
///
/// No validation of token shape — opaque pass-through.
pub trait TokenStore: Send + Sync {
    /// The persisted token, or `None` if unauthenticated.
    fn get(&self) -> Option<String>;
    /// Persist a token, replacing any previous one.
    fn set(&self, token: &str) -> Result<()>;
    /// Remove the persisted token.
    fn clear(&self) -> Result<()>;
}

// ─── FileTokenStore ───────────────────────────────────────────────────────────

/// Token persisted as a single file at `{data_dir}/token`, surviving
/// process restarts.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store rooted at `data_dir`. The directory is created on the
    /// first `set` if it does not exist yet.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: data_dir.into().join(TOKEN_FILE),
        }
    }

    fn ensure_parent(&self) -> Result<&Path> {
        let parent = self
            .path
            .parent()
            .context("token path has no parent directory")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data dir {}", parent.display()))?;
        Ok(parent)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => {
                let token = s.trim().to_string();
                if token.is_empty() {
                    None
                } else {
                    Some(token)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), err = %e, "failed to read token file");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        self.ensure_parent()?;
        std::fs::write(&self.path, token)
            .with_context(|| format!("failed to write token file {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to remove token file {}", self.path.display())
            }),
        }
    }
}

// ─── MemoryTokenStore ─────────────────────────────────────────────────────────

/// Non-durable store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a token, as if restored from a previous session.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.lock().expect("token lock poisoned").clone()
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.lock().expect("token lock poisoned") = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().expect("token lock poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path());
        assert_eq!(store.get(), None);

        store.set("abc.def.ghi").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc.def.ghi"));

        // A fresh store over the same directory sees the persisted token.
        let reopened = FileTokenStore::new(dir.path());
        assert_eq!(reopened.get().as_deref(), Some("abc.def.ghi"));

        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.clear().unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn set_creates_missing_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("deeper"));
        store.set("tok").unwrap();
        assert_eq!(store.get().as_deref(), Some("tok"));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::with_token("seed");
        assert_eq!(store.get().as_deref(), Some("seed"));
        store.set("next").unwrap();
        assert_eq!(store.get().as_deref(), Some("next"));
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }
}
