//! Deterministic fakes shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use offline_tiles::cache::MemoryCacheStorage;
use offline_tiles::tile::compositor::encode_png;
use offline_tiles::{
    CacheNamespace, CacheStats, CacheStorage, CompositeError, Compositing, Compositor,
    HostControl, Network, RasterCompositor, Request, RequestKey, Response, Result,
    ServiceWorker, TileAxis, WorkerConfig, WorkerError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const ORIGIN: &str = "https://example.com";

pub fn url(path: &str) -> Url {
    Url::parse(&format!("{}{}", ORIGIN, path)).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(url(path))
}

pub fn config(version: &str) -> WorkerConfig {
    WorkerConfig::builder()
        .scope(url("/"))
        .version(version)
        .build()
}

#[derive(Clone)]
struct Route {
    status: u16,
    content_type: String,
    body: Bytes,
}

/// Network that serves registered paths, records every fetch and can be
/// told to fail
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    failures: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve the default core manifest
    pub fn with_shell() -> Arc<Self> {
        let network = Self::new();
        network.serve("/", "text/html", "<html>root</html>");
        network.serve("/index.html", "text/html", "<html>index</html>");
        network.serve("/styles/css/main.css", "text/css", "body { margin: 0 }");
        network
    }

    pub fn serve(&self, path: &str, content_type: &str, body: impl Into<Bytes>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status: 200,
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
    }

    pub fn serve_status(&self, path: &str, status: u16) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status,
                content_type: "text/plain".to_string(),
                body: Bytes::from(format!("status {}", status)),
            },
        );
    }

    pub fn serve_png(&self, path: &str, image: &RgbaImage) -> Vec<u8> {
        let png = encode_png(image).unwrap();
        self.serve(path, "image/png", png.clone());
        png
    }

    /// Every fetch of `path` errors
    pub fn fail(&self, path: &str) {
        self.fail_times(path, usize::MAX);
    }

    /// The next `times` fetches of `path` error
    pub fn fail_times(&self, path: &str, times: usize) {
        self.failures.lock().unwrap().insert(path.to_string(), times);
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }

    pub fn total_fetches(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let path = request.url.path().to_string();
        self.log.lock().unwrap().push(path.clone());

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&path) {
                if *remaining > 0 {
                    if *remaining != usize::MAX {
                        *remaining -= 1;
                    }
                    return Err(WorkerError::NetworkError(format!("connection reset: {}", path)));
                }
            }
        }

        let route = self.routes.lock().unwrap().get(&path).cloned();
        let response = match route {
            Some(route) => Response::new(route.status, route.body)
                .with_header("Content-Type", route.content_type),
            None => Response::text(404, "Not Found"),
        };
        Ok(response.with_url(request.url.clone()))
    }
}

/// Raster compositor that counts invocations
pub struct CountingCompositor {
    inner: RasterCompositor,
    calls: AtomicUsize,
}

impl CountingCompositor {
    pub fn new(max_pixels: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: RasterCompositor::new(max_pixels),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Compositor for CountingCompositor {
    fn mirror_tile(
        &self,
        source: &[u8],
        axis: TileAxis,
    ) -> std::result::Result<Vec<u8>, CompositeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.mirror_tile(source, axis)
    }
}

/// Host that records lifecycle signals
#[derive(Default)]
pub struct RecordingHost {
    pub skip_waiting_calls: AtomicUsize,
    pub claim_calls: AtomicUsize,
    pub open_pages: usize,
}

impl RecordingHost {
    pub fn with_pages(open_pages: usize) -> Arc<Self> {
        Arc::new(Self {
            open_pages,
            ..Default::default()
        })
    }
}

#[async_trait]
impl HostControl for RecordingHost {
    async fn skip_waiting(&self) -> Result<()> {
        self.skip_waiting_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<usize> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_pages)
    }
}

/// Storage whose namespaces refuse writes for URLs ending in `poison`
pub struct FlakyStorage {
    inner: MemoryCacheStorage,
    poison: String,
}

impl FlakyStorage {
    pub fn new(poison: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryCacheStorage::new(),
            poison: poison.to_string(),
        })
    }
}

struct FlakyNamespace {
    inner: Arc<dyn CacheNamespace>,
    poison: String,
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CacheNamespace>> {
        let namespace: Arc<dyn CacheNamespace> = Arc::new(FlakyNamespace {
            inner: self.inner.open(name).await?,
            poison: self.poison.clone(),
        });
        Ok(namespace)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        self.inner.has(name).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.inner.delete(name).await
    }
}

#[async_trait]
impl CacheNamespace for FlakyNamespace {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<Response>> {
        self.inner.match_request(key).await
    }

    async fn put(&self, key: RequestKey, response: Response) -> Result<()> {
        if key.url.ends_with(&self.poison) {
            return Err(WorkerError::StorageError("quota exceeded".to_string()));
        }
        self.inner.put(key, response).await
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<RequestKey>> {
        self.inner.keys().await
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}

/// Worker over in-memory storage with probed compositing
pub fn worker(config: WorkerConfig, network: Arc<FakeNetwork>) -> ServiceWorker {
    worker_with(
        config,
        Arc::new(MemoryCacheStorage::new()),
        network,
        Compositing::probe(&WorkerConfig::default()),
    )
}

pub fn worker_with(
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<FakeNetwork>,
    compositing: Compositing,
) -> ServiceWorker {
    ServiceWorker::new(config, storage, network, RecordingHost::with_pages(0), compositing).unwrap()
}

/// 3x2 image where every pixel differs
pub fn distinct_pixels() -> RgbaImage {
    RgbaImage::from_fn(3, 2, |x, y| Rgba([(x * 60) as u8, (y * 100) as u8, (x + y) as u8, 255]))
}
