//! Response cache partitioned by generation.
//!
//! Each deployed version of the interceptor writes to its own generation
//! (`procurement-v1`, ...). Activating a version deletes every other one.

use super::request::{CacheKey, CachedResponse};
use crate::shared::error::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, generation: &str, key: &CacheKey) -> Result<Option<CachedResponse>, FetchError>;

    /// Store `response`, replacing any entry with the same key
    async fn put(&self, generation: &str, key: CacheKey, response: CachedResponse) -> Result<(), FetchError>;

    /// Names of all generations holding entries
    async fn generations(&self) -> Result<Vec<String>, FetchError>;

    /// Returns whether the generation existed
    async fn delete_generation(&self, generation: &str) -> Result<bool, FetchError>;
}

/// Process-local response cache
#[derive(Debug, Default)]
pub struct MemoryResponseCache {
    generations: RwLock<HashMap<String, HashMap<CacheKey, CachedResponse>>>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in one generation
    pub async fn len(&self, generation: &str) -> usize {
        self.generations
            .read()
            .await
            .get(generation)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn get(&self, generation: &str, key: &CacheKey) -> Result<Option<CachedResponse>, FetchError> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, generation: &str, key: CacheKey, response: CachedResponse) -> Result<(), FetchError> {
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    async fn generations(&self) -> Result<Vec<String>, FetchError> {
        let mut names: Vec<String> = self.generations.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, FetchError> {
        Ok(self.generations.write().await.remove(generation).is_some())
    }
}
