//! Cached entry: a response snapshot keyed by request identity

use crate::cache::types::RequestKey;
use crate::http::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored response with bookkeeping metadata
///
/// Entries never expire on their own. They disappear only when the whole
/// namespace holding them is deleted during a version rollover.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The request identity
    pub key: RequestKey,

    /// The stored response
    pub response: Response,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheMetadata {
    /// When the response was written
    pub cached_at: DateTime<Utc>,

    /// Last time the entry was served
    pub accessed_at: DateTime<Utc>,

    /// Number of times the entry was served
    pub access_count: u64,

    /// Approximate size of the stored response in bytes
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(key: RequestKey, response: Response) -> Self {
        let now = Utc::now();
        let size_bytes = key.url.len() + response.size_bytes();

        Self {
            key,
            response,
            metadata: CacheMetadata {
                cached_at: now,
                accessed_at: now,
                access_count: 0,
                size_bytes,
            },
        }
    }

    /// Mark the entry as served (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }

    /// Get the age of the entry
    pub fn age(&self) -> Duration {
        (Utc::now() - self.metadata.cached_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}
