//! Install and activate handling
//!
//! Install pre-populates the core namespace from a fixed manifest and asks the
//! host to promote this worker immediately. Activate deletes every namespace
//! from older versions and claims the open pages. Both run to completion
//! before returning; the host treats the returned future as its wait-until.

use crate::cache::{CacheCategory, CacheNamespace, CacheStorage, RequestKey, WorkerConfig};
use crate::error::{Result, WorkerError};
use crate::http::Request;
use crate::network::Network;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Host-side controls the worker can invoke
#[async_trait]
pub trait HostControl: Send + Sync {
    /// Supersede the previously active worker without waiting for pages to close
    async fn skip_waiting(&self) -> Result<()>;

    /// Take control of every open page; returns how many were claimed
    async fn claim_clients(&self) -> Result<usize>;
}

/// Host for running outside a browser: nothing to supersede, no pages
#[derive(Debug, Default, Clone, Copy)]
pub struct StandaloneHost;

#[async_trait]
impl HostControl for StandaloneHost {
    async fn skip_waiting(&self) -> Result<()> {
        debug!("skip_waiting: no previous worker to supersede");
        Ok(())
    }

    async fn claim_clients(&self) -> Result<usize> {
        debug!("claim_clients: no open pages");
        Ok(0)
    }
}

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the worker will never activate
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Result of a successful install
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReport {
    pub namespace: String,
    pub cached: Vec<String>,
    pub installed_at: DateTime<Utc>,
}

/// Result of a successful activation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateReport {
    pub evicted: Vec<String>,
    pub kept: Vec<String>,
    pub clients_claimed: usize,
    pub activated_at: DateTime<Utc>,
}

/// Drives install and activate against the injected capabilities
pub struct LifecycleManager {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    host: Arc<dyn HostControl>,
    state: Mutex<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        config: Arc<WorkerConfig>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        host: Arc<dyn HostControl>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
            host,
            state: Mutex::new(LifecycleState::Parsed),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Move `from -> to`, or fail without changing anything
    fn transition(&self, action: &str, from: LifecycleState, to: LifecycleState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *state != from {
            return Err(WorkerError::LifecycleError {
                action: action.to_string(),
                state: state.to_string(),
            });
        }
        *state = to;
        Ok(())
    }

    /// Pre-populate the core namespace. All-or-nothing: a failed fetch
    /// writes nothing, and a failed write or a refused `skip_waiting`
    /// removes the entries this install created. Entries that were already
    /// present before the install are left alone.
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition("install", LifecycleState::Parsed, LifecycleState::Installing)?;
        info!("Installing cache version {}", self.config.version);

        let populated = match self.populate_core().await {
            Ok(populated) => populated,
            Err(e) => {
                error!("Install failed: {}", e);
                self.set_state(LifecycleState::Redundant);
                return Err(e);
            }
        };

        if let Err(e) = self.host.skip_waiting().await {
            error!("Install failed, host refused skip_waiting: {}", e);
            rollback(populated.namespace.as_ref(), &populated.created).await;
            self.set_state(LifecycleState::Redundant);
            return Err(e);
        }

        self.set_state(LifecycleState::Installed);
        info!(
            "Installed {} core assets into {}",
            populated.report.cached.len(),
            populated.report.namespace
        );
        Ok(populated.report)
    }

    async fn populate_core(&self) -> Result<PopulatedCore> {
        let name = self.config.namespace_name(CacheCategory::Core);
        let namespace = self.storage.open(&name).await?;
        let urls = self.config.core_asset_urls()?;

        let fetched = try_join_all(urls.into_iter().map(|url| {
            let network = self.network.clone();
            async move {
                let request = Request::get(url);
                let response =
                    network
                        .fetch(&request)
                        .await
                        .map_err(|e| WorkerError::InstallError {
                            path: request.url.to_string(),
                            reason: e.to_string(),
                        })?;

                if !response.is_ok() {
                    return Err(WorkerError::InstallError {
                        path: request.url.to_string(),
                        reason: format!("status {}", response.status),
                    });
                }

                Ok((RequestKey::from(&request), response))
            }
        }))
        .await?;

        let existing: HashSet<RequestKey> = namespace.keys().await?.into_iter().collect();
        let mut cached = Vec::with_capacity(fetched.len());
        let mut created = Vec::new();

        for (key, response) in fetched {
            if let Err(e) = namespace.put(key.clone(), response).await {
                rollback(namespace.as_ref(), &created).await;
                return Err(WorkerError::InstallError {
                    path: key.url,
                    reason: e.to_string(),
                });
            }
            if !existing.contains(&key) {
                created.push(key.clone());
            }
            cached.push(key.url);
        }

        Ok(PopulatedCore {
            report: InstallReport {
                namespace: name,
                cached,
                installed_at: Utc::now(),
            },
            namespace,
            created,
        })
    }

    /// Evict namespaces from older versions, then claim open pages
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.transition("activate", LifecycleState::Installed, LifecycleState::Activating)?;

        match self.evict_and_claim().await {
            Ok(report) => {
                self.set_state(LifecycleState::Activated);
                info!(
                    "Activated version {} (evicted {}, claimed {} clients)",
                    self.config.version,
                    report.evicted.len(),
                    report.clients_claimed
                );
                Ok(report)
            }
            Err(e) => {
                error!("Activation failed: {}", e);
                // The install is still good; activation may be retried
                self.set_state(LifecycleState::Installed);
                Err(e)
            }
        }
    }

    async fn evict_and_claim(&self) -> Result<ActivateReport> {
        let (stale, kept): (Vec<String>, Vec<String>) = self
            .storage
            .keys()
            .await?
            .into_iter()
            .partition(|name| self.config.is_stale_namespace(name));

        try_join_all(stale.iter().map(|name| self.storage.delete(name))).await?;
        for name in &stale {
            debug!("Evicted stale namespace {}", name);
        }

        let clients_claimed = self.host.claim_clients().await?;

        Ok(ActivateReport {
            evicted: stale,
            kept,
            clients_claimed,
            activated_at: Utc::now(),
        })
    }
}

/// Outcome of writing the core manifest
struct PopulatedCore {
    report: InstallReport,
    namespace: Arc<dyn CacheNamespace>,
    /// Keys that did not exist before this install
    created: Vec<RequestKey>,
}

/// Delete the entries an unsuccessful install created
async fn rollback(namespace: &dyn CacheNamespace, created: &[RequestKey]) {
    if created.is_empty() {
        return;
    }
    warn!("Rolling back {} core entries in {}", created.len(), namespace.name());
    for key in created {
        if let Err(e) = namespace.delete(key).await {
            warn!("Rollback of {} failed: {}", key, e);
        }
    }
}
