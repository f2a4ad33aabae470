//! Storage backends for the response cache.
//!
//! Backends store opaque strings; encoding and expiry are the store's job.
//! Calls on distinct keys must not wait on each other.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CacheError;

/// Key-value storage behind [`CacheStore`](super::CacheStore).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Payload stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `payload` under `key`, replacing any previous value.
    async fn store(&self, key: &str, payload: String) -> Result<(), CacheError>;

    /// Remove `key`. Returns whether it was present.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// All stored keys.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Read-modify-write of one key.
    ///
    /// `apply` receives the current payload and returns the replacement, or
    /// `None` to leave it untouched. Returns the payload stored afterwards,
    /// or `None` when the key is absent.
    ///
    /// The default is a plain load followed by a store. Backends that can
    /// do better override it so concurrent updates of one key are not lost.
    async fn update(
        &self,
        key: &str,
        apply: &(dyn for<'a> Fn(&'a str) -> Option<String> + Send + Sync),
    ) -> Result<Option<String>, CacheError> {
        let Some(current) = self.load(key).await? else {
            return Ok(None);
        };
        match apply(&current) {
            Some(next) => {
                self.store(key, next.clone()).await?;
                Ok(Some(next))
            }
            None => Ok(Some(current)),
        }
    }
}

/// Process-local backend.
#[derive(Default)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, payload: String) -> Result<(), CacheError> {
        self.entries.write().await.insert(key.to_string(), payload);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn update(
        &self,
        key: &str,
        apply: &(dyn for<'a> Fn(&'a str) -> Option<String> + Send + Sync),
    ) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.write().await;
        let Some(current) = entries.get_mut(key) else {
            return Ok(None);
        };
        if let Some(next) = apply(current) {
            *current = next;
        }
        Ok(Some(current.clone()))
    }
}
