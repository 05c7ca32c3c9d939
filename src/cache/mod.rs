//! # Versioned cache namespaces
//!
//! Three named partitions hold the worker's data: the application shell
//! (`core`), static images (`img`) and synthesized tiles (`tile`). Each name
//! carries the configured version tag, and activation deletes every prefixed
//! namespace whose tag is not the current one. That rollover is the only
//! eviction there is; entries never expire individually.
//!
//! ## Example
//!
//! ```rust
//! use offline_tiles::cache::{
//!     CacheCategory, CacheStorage, MemoryCacheStorage, RequestKey, WorkerConfig,
//! };
//! use offline_tiles::http::{Request, Response};
//!
//! # async fn example() -> offline_tiles::Result<()> {
//! let config = WorkerConfig::builder().version("v3").build();
//! let storage = MemoryCacheStorage::new();
//!
//! let images = storage.open(&config.namespace_name(CacheCategory::Image)).await?;
//! let request = Request::parse_get("http://localhost:8080/static/logo.png")?;
//! images.put(RequestKey::from(&request), Response::new(200, vec![0u8; 16])).await?;
//!
//! assert!(images.match_request(&RequestKey::from(&request)).await?.is_some());
//! assert_eq!(storage.keys().await?, vec!["lissikk-img-v3".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod policy;
pub mod storage;
pub mod types;

pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use policy::{BackgroundTasks, CachePolicy};
pub use storage::{CacheNamespace, CacheStorage, MemoryCacheStorage, MemoryNamespace};
pub use types::{CacheCategory, CacheStats, NamespaceName, RequestKey};
