//! The worker root: one instance per cache version

use crate::cache::policy::BackgroundTasks;
use crate::cache::{CacheCategory, CacheStats, CacheStorage, MemoryCacheStorage, WorkerConfig};
use crate::classify::Decision;
use crate::dispatcher::{FetchDispatcher, FetchOutcome};
use crate::error::Result;
use crate::http::Request;
use crate::lifecycle::{
    ActivateReport, HostControl, InstallReport, LifecycleManager, LifecycleState, StandaloneHost,
};
use crate::network::Network;
use crate::tile::Compositing;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Owns the lifecycle, the dispatcher and the background task set
pub struct ServiceWorker {
    instance_id: Uuid,
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    lifecycle: LifecycleManager,
    dispatcher: FetchDispatcher,
    background: Arc<BackgroundTasks>,
}

impl ServiceWorker {
    /// Build a worker from explicit capabilities
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        host: Arc<dyn HostControl>,
        compositing: Compositing,
    ) -> Result<Self> {
        config.validate()?;

        let instance_id = Uuid::new_v4();
        let config = Arc::new(config);
        let background = Arc::new(BackgroundTasks::new());

        info!(
            "Worker {} created for {} (version {}, compositing: {:?})",
            instance_id,
            config.scope,
            config.version,
            compositing
        );

        Ok(Self {
            instance_id,
            lifecycle: LifecycleManager::new(
                config.clone(),
                storage.clone(),
                network.clone(),
                host,
            ),
            dispatcher: FetchDispatcher::new(
                config.clone(),
                storage.clone(),
                network,
                compositing,
                background.clone(),
            ),
            config,
            storage,
            background,
        })
    }

    /// In-memory storage, no host, probed compositing
    pub fn standalone(config: WorkerConfig, network: Arc<dyn Network>) -> Result<Self> {
        let compositing = Compositing::probe(&config);
        Self::new(
            config,
            Arc::new(MemoryCacheStorage::new()),
            network,
            Arc::new(StandaloneHost),
            compositing,
        )
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn dispatcher(&self) -> &FetchDispatcher {
        &self.dispatcher
    }

    pub async fn on_install(&self) -> Result<InstallReport> {
        self.lifecycle
            .install()
            .instrument(info_span!("install", worker = %self.instance_id))
            .await
    }

    pub async fn on_activate(&self) -> Result<ActivateReport> {
        self.lifecycle
            .activate()
            .instrument(info_span!("activate", worker = %self.instance_id))
            .await
    }

    /// Routing decision without touching storage or network
    pub fn classify(&self, request: &Request) -> Decision {
        self.dispatcher.classify_and_route(request)
    }

    pub async fn on_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        self.dispatcher
            .handle_fetch(request)
            .instrument(info_span!("fetch", worker = %self.instance_id, url = %request.url))
            .await
    }

    /// Wait for background revalidations to finish
    pub async fn settle(&self) -> usize {
        self.background.settle().await
    }

    /// Statistics for the current namespaces that exist
    pub async fn namespace_stats(&self) -> Result<BTreeMap<String, CacheStats>> {
        let mut stats = BTreeMap::new();
        for category in CacheCategory::ALL {
            let name = self.config.namespace_name(category);
            if self.storage.has(&name).await? {
                let namespace = self.storage.open(&name).await?;
                stats.insert(name, namespace.stats().await);
            }
        }
        Ok(stats)
    }
}
