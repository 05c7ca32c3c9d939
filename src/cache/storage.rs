//! Named cache storage: the capability traits and the in-memory backend
//!
//! The worker never owns storage. It reaches it through [`CacheStorage`],
//! which hands out [`CacheNamespace`] handles by name. Backends are expected to
//! provide per-key atomicity; the worker adds no locking of its own because
//! every write is keyed by the full request identity and idempotent.

use crate::cache::{
    entry::CacheEntry,
    types::{CacheStats, NamespaceName, RequestKey},
};
use crate::error::Result;
use crate::http::Response;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A single named partition mapping request identities to responses
#[async_trait]
pub trait CacheNamespace: Send + Sync {
    /// Name of this namespace
    fn name(&self) -> &str;

    /// Look up a stored response
    async fn match_request(&self, key: &RequestKey) -> Result<Option<Response>>;

    /// Store a response, replacing any previous entry for the key
    async fn put(&self, key: RequestKey, response: Response) -> Result<()>;

    /// Remove one entry; returns whether it existed
    async fn delete(&self, key: &RequestKey) -> Result<bool>;

    /// All stored keys
    async fn keys(&self) -> Result<Vec<RequestKey>>;

    /// Lookup and write counters
    async fn stats(&self) -> CacheStats;
}

/// The set of named partitions available to the worker
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a namespace, creating it if absent
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheNamespace>>;

    /// Whether a namespace exists
    async fn has(&self, name: &str) -> Result<bool>;

    /// Enumerate all namespace names
    async fn keys(&self) -> Result<Vec<NamespaceName>>;

    /// Delete a namespace and everything in it; returns whether it existed
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<BTreeMap<NamespaceName, Arc<MemoryNamespace>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheNamespace>> {
        if let Some(existing) = self.namespaces.read().await.get(name) {
            let namespace: Arc<dyn CacheNamespace> = existing.clone();
            return Ok(namespace);
        }

        let mut namespaces = self.namespaces.write().await;
        let namespace: Arc<dyn CacheNamespace> = namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating cache namespace: {}", name);
                Arc::new(MemoryNamespace::new(name))
            })
            .clone();
        Ok(namespace)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.namespaces.read().await.contains_key(name))
    }

    async fn keys(&self) -> Result<Vec<NamespaceName>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.namespaces.write().await.remove(name);
        if let Some(namespace) = &removed {
            info!(
                "Deleted cache namespace {} ({} entries)",
                name,
                namespace.len().await
            );
        }
        Ok(removed.is_some())
    }
}

/// In-memory namespace
pub struct MemoryNamespace {
    name: NamespaceName,
    store: RwLock<NamespaceStore>,
}

/// Internal namespace storage
#[derive(Default)]
struct NamespaceStore {
    /// Main storage: key -> entry
    entries: HashMap<RequestKey, CacheEntry>,

    /// Current statistics
    stats: CacheStats,
}

impl MemoryNamespace {
    pub fn new(name: impl Into<NamespaceName>) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(NamespaceStore::default()),
        }
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Full entry including metadata, without counting as an access
    pub async fn entry(&self, key: &RequestKey) -> Option<CacheEntry> {
        self.store.read().await.entries.get(key).cloned()
    }
}

impl NamespaceStore {
    fn refresh_totals(&mut self) {
        self.stats.entries = self.entries.len();
        self.stats.size_bytes = self.entries.values().map(|e| e.metadata.size_bytes).sum();
    }
}

#[async_trait]
impl CacheNamespace for MemoryNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<Response>> {
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        match store.entries.get_mut(key) {
            Some(entry) => {
                entry.mark_accessed();
                let response = entry.response.clone();
                store.stats.hits += 1;
                debug!("Cache hit in {}: {}", self.name, key);
                Ok(Some(response))
            }
            None => {
                store.stats.misses += 1;
                debug!("Cache miss in {}: {}", self.name, key);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: RequestKey, response: Response) -> Result<()> {
        let entry = CacheEntry::new(key.clone(), response);
        let mut store = self.store.write().await;

        if store.entries.insert(key.clone(), entry).is_some() {
            debug!("Replaced cache entry in {}: {}", self.name, key);
        } else {
            debug!("Stored cache entry in {}: {}", self.name, key);
        }

        store.stats.stores += 1;
        store.refresh_totals();
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool> {
        let mut store = self.store.write().await;
        let removed = store.entries.remove(key).is_some();
        if removed {
            store.refresh_totals();
            debug!("Removed cache entry from {}: {}", self.name, key);
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<RequestKey>> {
        let store = self.store.read().await;
        let mut keys: Vec<RequestKey> = store.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn stats(&self) -> CacheStats {
        self.store.read().await.stats.clone()
    }
}
