//! Retrieval strategies: cache-first and stale-while-revalidate
//!
//! Stale-while-revalidate launches its network leg as a separate task before
//! the cache lookup is awaited, so the two race. When the cached copy wins,
//! the still-running network leg is handed to [`BackgroundTasks`]; the host
//! drains that set with [`BackgroundTasks::settle`] the same way it would
//! wait on a pending lifecycle promise.

use crate::cache::storage::CacheNamespace;
use crate::cache::types::RequestKey;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::network::Network;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Work that outlives the response it was started for
#[derive(Default)]
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a future to completion in the background. Tasks that already
    /// finished are reaped first, so the set only holds unfinished work.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                warn!("Background task did not complete: {}", e);
            }
        }

        tasks.spawn(future);
    }

    /// Keep an already running task alive until the next settle
    pub fn track<T: Send + 'static>(&self, handle: JoinHandle<T>) {
        self.spawn(async move {
            let _ = handle.await;
        });
    }

    /// Tasks still running
    pub fn pending(&self) -> usize {
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Wait for every background task, including ones spawned while
    /// waiting. Returns how many this call joined; work already reaped by
    /// `spawn` or `pending` is not counted.
    pub async fn settle(&self) -> usize {
        let mut settled = 0;

        loop {
            let mut batch = std::mem::take(
                &mut *self
                    .tasks
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            );
            if batch.is_empty() {
                break;
            }

            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    warn!("Background task did not complete: {}", e);
                }
                settled += 1;
            }
        }

        settled
    }
}

/// The two retrieval strategies, bound to a network capability
#[derive(Clone)]
pub struct CachePolicy {
    network: Arc<dyn Network>,
    background: Arc<BackgroundTasks>,
}

impl CachePolicy {
    pub fn new(network: Arc<dyn Network>, background: Arc<BackgroundTasks>) -> Self {
        Self { network, background }
    }

    /// Serve from the namespace; on a miss fetch, store if ok, and return.
    /// Network errors propagate.
    pub async fn cache_first(
        &self,
        request: &Request,
        namespace: &Arc<dyn CacheNamespace>,
    ) -> Result<Response> {
        let key = RequestKey::from(request);

        if let Some(cached) = namespace.match_request(&key).await? {
            debug!("cache-first hit in {}: {}", namespace.name(), key);
            return Ok(cached);
        }

        let response = self.network.fetch(request).await?;
        if response.is_ok() {
            store(namespace.as_ref(), key, response.clone()).await;
        } else {
            debug!(
                "cache-first not storing {} (status {})",
                request.url, response.status
            );
        }

        Ok(response)
    }

    /// Serve the cached copy immediately while refreshing it from the
    /// network. Without a cached copy, wait for the network; if that leg
    /// errored, make one last fetch whose error propagates.
    pub async fn stale_while_revalidate(
        &self,
        request: &Request,
        namespace: &Arc<dyn CacheNamespace>,
    ) -> Result<Response> {
        let key = RequestKey::from(request);

        let network_leg = tokio::spawn(revalidate(
            self.network.clone(),
            namespace.clone(),
            request.clone(),
            key.clone(),
        ));

        let cached = match namespace.match_request(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                self.background.track(network_leg);
                return Err(e);
            }
        };

        if let Some(cached) = cached {
            debug!("stale-while-revalidate serving cached {}", key);
            self.background.track(network_leg);
            return Ok(cached);
        }

        match network_leg.await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => {
                debug!("stale-while-revalidate last-resort fetch for {}", key);
                self.network.fetch(request).await
            }
            Err(e) => {
                warn!("Revalidation task for {} did not complete: {}", key, e);
                self.network.fetch(request).await
            }
        }
    }
}

/// Network leg of stale-while-revalidate. Errors resolve to `None`.
async fn revalidate(
    network: Arc<dyn Network>,
    namespace: Arc<dyn CacheNamespace>,
    request: Request,
    key: RequestKey,
) -> Option<Response> {
    match network.fetch(&request).await {
        Ok(response) => {
            if response.is_ok() {
                store(namespace.as_ref(), key, response.clone()).await;
            }
            Some(response)
        }
        Err(e) => {
            debug!("Revalidation of {} failed: {}", key, e);
            None
        }
    }
}

/// Write a copy, logging instead of failing the response
pub(crate) async fn store(namespace: &dyn CacheNamespace, key: RequestKey, response: Response) {
    let label = key.to_string();
    if let Err(e) = namespace.put(key, response).await {
        warn!("Failed to store {} in {}: {}", label, namespace.name(), e);
    }
}
