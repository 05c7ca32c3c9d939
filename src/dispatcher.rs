//! Fetch dispatch: classify, then hand the request to the policy for its class

use crate::cache::policy::{store, BackgroundTasks, CachePolicy};
use crate::cache::{CacheNamespace, CacheStorage, RequestKey, WorkerConfig};
use crate::classify::{classify, DeclineReason, Decision, RequestClass};
use crate::error::Result;
use crate::http::{Request, Response};
use crate::network::Network;
use crate::tile::{Compositing, TileSynthesizer};
use std::sync::Arc;
use tracing::debug;

/// What the host should do with an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; default network handling applies
    Declined(DeclineReason),

    /// Substitute this response
    Respond { class: RequestClass, response: Response },
}

impl FetchOutcome {
    pub fn is_declined(&self) -> bool {
        matches!(self, FetchOutcome::Declined(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            FetchOutcome::Declined(_) => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            FetchOutcome::Declined(_) => None,
        }
    }
}

/// Routes intercepted requests. Depends on, but does not own, the storage
/// and network capabilities.
pub struct FetchDispatcher {
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    policy: CachePolicy,
    synthesizer: TileSynthesizer,
}

impl FetchDispatcher {
    pub fn new(
        config: Arc<WorkerConfig>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        compositing: Compositing,
        background: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            policy: CachePolicy::new(network.clone(), background),
            synthesizer: TileSynthesizer::new(network, compositing, config.clone()),
            config,
            storage,
        }
    }

    /// Pure routing decision for a request
    pub fn classify_and_route(&self, request: &Request) -> Decision {
        classify(request, &self.config)
    }

    pub fn synthesizer(&self) -> &TileSynthesizer {
        &self.synthesizer
    }

    /// Handle one intercepted request
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
        let class = match self.classify_and_route(request) {
            Decision::Decline(reason) => {
                debug!("Declined {}: {}", request, reason);
                return Ok(FetchOutcome::Declined(reason));
            }
            Decision::Route(class) => class,
        };

        let namespace = self
            .storage
            .open(&self.config.namespace_name(class.category()))
            .await?;

        let response = match class {
            RequestClass::Tile => self.serve_tile(request, &namespace).await?,
            RequestClass::StaticImage => self.policy.cache_first(request, &namespace).await?,
            RequestClass::Core => self.policy.stale_while_revalidate(request, &namespace).await?,
        };

        debug!("{} -> {} ({})", request, response.status, class);
        Ok(FetchOutcome::Respond { class, response })
    }

    /// Tile namespace first, then synthesize and store ok results
    async fn serve_tile(
        &self,
        request: &Request,
        namespace: &Arc<dyn CacheNamespace>,
    ) -> Result<Response> {
        let key = RequestKey::from(request);

        if let Some(cached) = namespace.match_request(&key).await? {
            debug!("Serving cached tile {}", key);
            return Ok(cached);
        }

        let response = self.synthesizer.respond(request).await?;
        if response.is_ok() {
            store(namespace.as_ref(), key, response.clone()).await;
        }
        Ok(response)
    }
}
