//! Durable key-value slots that survive process restarts.
//!
//! Writes are whole-value and synchronous: once `set` or `remove` returns, a
//! fresh process reading the same key observes the new value.

use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::Result;
use crate::error::Error;

pub trait Storage: Send + Sync + fmt::Debug {
    /// `Ok(None)` when the key has never been written or was removed.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local storage. Clones share the same slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    slots: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots.remove(key);
        Ok(())
    }
}

/// One file per key under a directory.
///
/// Writes go to `{key}.tmp`, are synced, then renamed over the target so a
/// crash never leaves a partial value behind.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(Error::validation(format!("invalid storage key `{key}`")));
        }
        Ok(self.dir.join(key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let target = self.path_for(key)?;
        let tmp = self.dir.join(format!("{key}.tmp"));

        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_slots() -> Result<()> {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        storage.set("auth_token", "abc")?;
        assert_eq!(other.get("auth_token")?.as_deref(), Some("abc"));

        other.remove("auth_token")?;
        assert_eq!(storage.get("auth_token")?, None);
        storage.remove("auth_token")?;
        Ok(())
    }

    #[test]
    fn file_storage_survives_reopen() -> Result<()> {
        let dir = tempfile::TempDir::new()?;

        let storage = FileStorage::open(dir.path())?;
        assert_eq!(storage.get("auth_token")?, None);
        storage.set("auth_token", "first")?;
        storage.set("auth_token", "second")?;

        let reopened = FileStorage::open(dir.path())?;
        assert_eq!(reopened.get("auth_token")?.as_deref(), Some("second"));
        assert!(
            !dir.path().join("auth_token.tmp").exists(),
            "temp file must be renamed away"
        );

        reopened.remove("auth_token")?;
        reopened.remove("auth_token")?;
        assert_eq!(storage.get("auth_token")?, None);
        Ok(())
    }

    #[test]
    fn file_storage_rejects_path_like_keys() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let storage = FileStorage::open(dir.path())?;

        for key in ["", "../escape", "a/b", ".hidden"] {
            let err = storage.set(key, "x").unwrap_err();
            assert_eq!(err.kind(), crate::error::Kind::Validation, "key {key:?}");
        }
        Ok(())
    }
}
