//! # offline-tiles
//!
//! Fetch interception and offline caching for a single web origin, with
//! on-the-fly generation of mirrored image tiles.
//!
//! ## Features
//!
//! - Versioned cache namespaces with rollover eviction on activation
//! - All-or-nothing pre-population of the application shell at install
//! - Cache-first for static images, stale-while-revalidate for everything else
//! - Mirror-tile synthesis (`?axis=x|y&src=/static/...`) with its own namespace
//! - Storage, network and host access behind small async traits, so every
//!   path can be driven by deterministic fakes
//!
//! ## Request routing
//!
//! | Request | Handling |
//! |---|---|
//! | non-GET or cross-origin | declined, default handling |
//! | path ends with the tile suffix | tile namespace, else synthesize |
//! | `.jpg`/`.png` under `/static/` | cache-first on the image namespace |
//! | anything else | stale-while-revalidate on the core namespace |
//!
//! ## Example
//!
//! ```no_run
//! use offline_tiles::{Request, ServiceWorker, StaticDirNetwork, WorkerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WorkerConfig::from_env()?;
//!     let network = Arc::new(StaticDirNetwork::new(&config.scope, "./site"));
//!     let worker = ServiceWorker::standalone(config, network)?;
//!
//!     worker.on_install().await?;
//!     worker.on_activate().await?;
//!
//!     let request =
//!         Request::parse_get("http://localhost:8080/__tile?axis=x&src=/static/wall.png")?;
//!     if let Some(response) = worker.on_fetch(&request).await?.into_response() {
//!         println!("{} ({} bytes)", response.status, response.body.len());
//!     }
//!
//!     worker.settle().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod classify;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod network;
pub mod tile;
pub mod worker;

// Re-export main types for convenience
pub use cache::{
    BackgroundTasks, CacheCategory, CacheNamespace, CachePolicy, CacheStats, CacheStorage,
    MemoryCacheStorage, RequestKey, WorkerConfig, WorkerConfigBuilder,
};
pub use classify::{classify, DeclineReason, Decision, RequestClass};
pub use dispatcher::{FetchDispatcher, FetchOutcome};
pub use error::{Result, WorkerError};
pub use http::{Headers, Method, Request, Response};
pub use lifecycle::{
    ActivateReport, HostControl, InstallReport, LifecycleManager, LifecycleState, StandaloneHost,
};
pub use network::{Network, StaticDirNetwork};
pub use tile::{
    CompositeError, Compositing, Compositor, RasterCompositor, TileAxis, TileDescriptor,
    TileRejection, TileSynthesizer,
};
pub use worker::ServiceWorker;
