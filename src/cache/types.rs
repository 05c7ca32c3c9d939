//! Core type definitions for the cache namespaces

use crate::http::{Method, Request};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Namespace name type - `"{prefix}-{label}-{version}"`
pub type NamespaceName = String;

/// Canonical request identity used as the key inside a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: Method, url: &Url) -> Self {
        Self {
            method,
            url: url.as_str().to_string(),
        }
    }
}

impl From<&Request> for RequestKey {
    fn from(request: &Request) -> Self {
        Self::new(request.method, &request.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// The three logical partitions the worker keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    /// Application shell: HTML, stylesheets, scripts
    Core,

    /// Static `.jpg`/`.png` assets
    Image,

    /// Synthesized mirror tiles
    Tile,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 3] = [
        CacheCategory::Core,
        CacheCategory::Image,
        CacheCategory::Tile,
    ];

    /// Label used inside the namespace name
    pub fn label(&self) -> &'static str {
        match self {
            CacheCategory::Core => "core",
            CacheCategory::Image => "img",
            CacheCategory::Tile => "tile",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Statistics for one namespace
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,

    /// Lookups that found nothing
    pub misses: u64,

    /// Writes (new entries and replacements)
    pub stores: u64,

    /// Number of entries currently held
    pub entries: usize,

    /// Total size of held responses in bytes
    pub size_bytes: usize,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, stores: {}, entries: {}, size: {} bytes }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.stores,
            self.entries,
            self.size_bytes
        )
    }
}
