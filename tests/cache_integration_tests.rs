//! Integration tests for the retrieval strategies
//!
//! These tests verify:
//! - Cache-first idempotence and its refusal to store failures
//! - Stale-while-revalidate serving stale content, then the refreshed copy
//! - Last-resort fetching when the revalidation leg errors
//! - Stale-while-revalidate starting its fetch before the lookup finishes
//! - Background revalidations not accumulating once they finish

mod common;

use async_trait::async_trait;
use common::{get, FakeNetwork};
use offline_tiles::{
    BackgroundTasks, CacheNamespace, CachePolicy, CacheStats, CacheStorage, MemoryCacheStorage,
    RequestKey, Response, Result, WorkerError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

async fn namespace(name: &str) -> Arc<dyn CacheNamespace> {
    MemoryCacheStorage::new().open(name).await.unwrap()
}

fn policy(network: Arc<FakeNetwork>) -> (CachePolicy, Arc<BackgroundTasks>) {
    let background = Arc::new(BackgroundTasks::new());
    (CachePolicy::new(network, background.clone()), background)
}

#[tokio::test]
async fn test_cache_first_fetches_once() {
    let network = FakeNetwork::new();
    network.serve("/static/photo.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]);
    let (policy, _) = policy(network.clone());
    let images = namespace("lissikk-img-v1").await;
    let request = get("/static/photo.jpg");

    let first = policy.cache_first(&request, &images).await.unwrap();
    let second = policy.cache_first(&request, &images).await.unwrap();

    assert_eq!(first.body, second.body);
    assert_eq!(network.fetch_count("/static/photo.jpg"), 1);

    let stats = images.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.stores, 1);
}

#[tokio::test]
async fn test_cache_first_does_not_store_failures() {
    let network = FakeNetwork::new();
    network.serve_status("/static/gone.png", 404);
    let (policy, _) = policy(network.clone());
    let images = namespace("lissikk-img-v1").await;
    let request = get("/static/gone.png");

    let response = policy.cache_first(&request, &images).await.unwrap();
    assert_eq!(response.status, 404);
    assert!(images.keys().await.unwrap().is_empty());

    // Not cached, so the next call goes to the network again
    policy.cache_first(&request, &images).await.unwrap();
    assert_eq!(network.fetch_count("/static/gone.png"), 2);
}

#[tokio::test]
async fn test_cache_first_propagates_network_error() {
    let network = FakeNetwork::new();
    network.fail("/static/photo.jpg");
    let (policy, _) = policy(network);
    let images = namespace("lissikk-img-v1").await;

    let result = policy.cache_first(&get("/static/photo.jpg"), &images).await;
    assert!(matches!(result, Err(WorkerError::NetworkError(_))));
    assert!(images.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_swr_miss_waits_for_network_and_stores() {
    let network = FakeNetwork::new();
    network.serve("/app.js", "text/javascript", "console.log(1)");
    let (policy, background) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;
    let request = get("/app.js");

    let response = policy.stale_while_revalidate(&request, &core).await.unwrap();
    assert_eq!(response.body, "console.log(1)");
    assert_eq!(network.fetch_count("/app.js"), 1);
    assert_eq!(background.pending(), 0);

    let stored = core.match_request(&RequestKey::from(&request)).await.unwrap();
    assert_eq!(stored.unwrap().body, "console.log(1)");
}

#[tokio::test]
async fn test_swr_serves_stale_then_fresh() {
    let network = FakeNetwork::new();
    network.serve("/index.html", "text/html", "old");
    let (policy, background) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;
    let request = get("/index.html");

    // Prime the cache
    policy.stale_while_revalidate(&request, &core).await.unwrap();

    network.serve("/index.html", "text/html", "new");

    let stale = policy.stale_while_revalidate(&request, &core).await.unwrap();
    assert_eq!(stale.body, "old");

    assert_eq!(background.settle().await, 1);

    let fresh = policy.stale_while_revalidate(&request, &core).await.unwrap();
    assert_eq!(fresh.body, "new");
    background.settle().await;

    assert_eq!(network.fetch_count("/index.html"), 3);
}

#[tokio::test]
async fn test_swr_background_failure_is_swallowed() {
    let network = FakeNetwork::new();
    network.serve("/index.html", "text/html", "cached");
    let (policy, background) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;
    let request = get("/index.html");

    policy.stale_while_revalidate(&request, &core).await.unwrap();
    network.fail("/index.html");

    let response = policy.stale_while_revalidate(&request, &core).await.unwrap();
    assert_eq!(response.body, "cached");
    background.settle().await;

    // Cached copy survives the failed refresh
    let stored = core.match_request(&RequestKey::from(&request)).await.unwrap();
    assert_eq!(stored.unwrap().body, "cached");
}

#[tokio::test]
async fn test_swr_last_resort_fetch() {
    let network = FakeNetwork::new();
    network.serve("/index.html", "text/html", "recovered");
    network.fail_times("/index.html", 1);
    let (policy, _) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;

    let response = policy
        .stale_while_revalidate(&get("/index.html"), &core)
        .await
        .unwrap();

    assert_eq!(response.body, "recovered");
    assert_eq!(network.fetch_count("/index.html"), 2);
    // The last-resort response is not written back
    assert!(core.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_swr_last_resort_error_propagates() {
    let network = FakeNetwork::new();
    network.fail("/index.html");
    let (policy, _) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;

    let result = policy.stale_while_revalidate(&get("/index.html"), &core).await;
    assert!(matches!(result, Err(WorkerError::NetworkError(_))));
    assert_eq!(network.fetch_count("/index.html"), 2);
}

#[tokio::test]
async fn test_swr_returns_non_ok_without_storing() {
    let network = FakeNetwork::new();
    network.serve_status("/missing.css", 404);
    let (policy, _) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;

    let response = policy
        .stale_while_revalidate(&get("/missing.css"), &core)
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(network.fetch_count("/missing.css"), 1);
    assert!(core.keys().await.unwrap().is_empty());
}

/// Namespace whose lookups block until the gate is opened
struct GatedNamespace {
    inner: Arc<dyn CacheNamespace>,
    gate: Arc<Notify>,
}

#[async_trait]
impl CacheNamespace for GatedNamespace {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<Response>> {
        self.gate.notified().await;
        self.inner.match_request(key).await
    }

    async fn put(&self, key: RequestKey, response: Response) -> Result<()> {
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

#[tokio::test]
async fn test_swr_fetch_starts_before_lookup_completes() {
    let network = FakeNetwork::new();
    network.serve("/index.html", "text/html", "fresh");
    let (policy, _) = policy(network.clone());

    let gate = Arc::new(Notify::new());
    let core: Arc<dyn CacheNamespace> = Arc::new(GatedNamespace {
        inner: namespace("lissikk-core-v1").await,
        gate: gate.clone(),
    });

    // The lookup is only released once the network has been asked
    let watcher = network.clone();
    let opener = tokio::spawn(async move {
        while watcher.fetch_count("/index.html") == 0 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
    });

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        policy.stale_while_revalidate(&get("/index.html"), &core),
    )
    .await
    .expect("lookup and fetch did not overlap")
    .unwrap();

    assert_eq!(response.body, "fresh");
    opener.await.unwrap();
}

#[tokio::test]
async fn test_swr_background_work_does_not_accumulate() {
    let network = FakeNetwork::new();
    network.serve("/index.html", "text/html", "page");
    let (policy, background) = policy(network.clone());
    let core = namespace("lissikk-core-v1").await;
    let request = get("/index.html");

    for _ in 0..500 {
        policy.stale_while_revalidate(&request, &core).await.unwrap();
        tokio::task::yield_now().await;
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(network.fetch_count("/index.html"), 500);
    assert_eq!(background.pending(), 0);
}
