use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret as _, SecretString};

use crate::Result;
use crate::storage::Storage;

/// Owner of the single bearer credential.
///
/// Every write is mirrored to durable storage before it returns, and readers
/// always see the latest in-memory value.
#[derive(Debug)]
pub struct CredentialStore {
    current: RwLock<Option<SecretString>>,
    storage: Arc<dyn Storage>,
    key: String,
}

impl CredentialStore {
    /// Creates the store and hydrates it from durable storage on a best-effort basis.
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        let store = Self {
            current: RwLock::new(None),
            storage,
            key: key.into(),
        };
        store.hydrate();
        store
    }

    #[must_use]
    pub fn get(&self) -> Option<SecretString> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// `None` clears, `Some` overwrites.
    ///
    /// Memory is updated even when the durable write fails, in which case the
    /// storage error is returned.
    pub fn set(&self, credential: Option<SecretString>) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);

        let persisted = match &credential {
            Some(token) => self.storage.set(&self.key, token.expose_secret()),
            None => self.storage.remove(&self.key),
        };
        *current = credential;

        #[cfg(feature = "tracing")]
        if let Err(e) = &persisted {
            tracing::warn!(key = %self.key, error = %e, "failed to persist credential");
        }
        persisted
    }

    pub fn clear(&self) -> Result<()> {
        self.set(None)
    }

    /// Seeds memory from durable storage when nothing is held yet.
    ///
    /// Absence or an unreadable slot leaves the store empty.
    pub fn hydrate(&self) -> Option<SecretString> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.is_none() {
            match self.storage.get(&self.key) {
                Ok(stored) => {
                    *current = stored
                        .filter(|token| !token.is_empty())
                        .map(SecretString::from);
                }
                #[cfg_attr(not(feature = "tracing"), expect(unused_variables, reason = "logged only with tracing"))]
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(key = %self.key, error = %e, "failed to read stored credential");
                }
            }
        }
        current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn exposed(store: &CredentialStore) -> Option<String> {
        store.get().map(|t| t.expose_secret().to_owned())
    }

    #[test]
    fn last_write_wins_in_memory_and_storage() -> Result<()> {
        let storage = MemoryStorage::new();
        let store = CredentialStore::new(Arc::new(storage.clone()), "auth_token");

        let sequence = [Some("a"), Some("b"), None, None, Some("c"), None, Some("d")];
        for value in sequence {
            store.set(value.map(SecretString::from))?;
            assert_eq!(exposed(&store).as_deref(), value);
            assert_eq!(storage.get("auth_token")?.as_deref(), value);
        }
        Ok(())
    }

    #[test]
    fn hydrates_from_storage_on_construction() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.set("auth_token", "persisted")?;

        let store = CredentialStore::new(Arc::new(storage), "auth_token");
        assert_eq!(exposed(&store).as_deref(), Some("persisted"));
        Ok(())
    }

    #[test]
    fn absent_or_empty_slot_is_logged_out() -> Result<()> {
        let storage = MemoryStorage::new();
        let store = CredentialStore::new(Arc::new(storage.clone()), "auth_token");
        assert!(!store.is_present(), "nothing stored");

        storage.set("auth_token", "")?;
        assert!(store.hydrate().is_none(), "empty slot means logged out");
        Ok(())
    }

    #[test]
    fn hydrate_does_not_override_memory() -> Result<()> {
        let storage = MemoryStorage::new();
        let store = CredentialStore::new(Arc::new(storage.clone()), "auth_token");
        store.set(Some(SecretString::from("live")))?;

        storage.set("auth_token", "other-tab")?;
        let hydrated = store.hydrate().map(|t| t.expose_secret().to_owned());
        assert_eq!(hydrated.as_deref(), Some("live"));
        Ok(())
    }
}
