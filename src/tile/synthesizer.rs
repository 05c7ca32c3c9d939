//! Tile synthesis: validate, fetch the source, composite, wrap as a response

use crate::cache::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::http::{Request, Response};
use crate::network::Network;
use crate::tile::compositor::Compositing;
use crate::tile::descriptor::TileDescriptor;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces mirrored tiles for validated tile requests
pub struct TileSynthesizer {
    network: Arc<dyn Network>,
    compositing: Compositing,
    config: Arc<WorkerConfig>,
}

impl TileSynthesizer {
    pub fn new(
        network: Arc<dyn Network>,
        compositing: Compositing,
        config: Arc<WorkerConfig>,
    ) -> Self {
        Self {
            network,
            compositing,
            config,
        }
    }

    pub fn compositing(&self) -> &Compositing {
        &self.compositing
    }

    /// Validate a tile request and synthesize it. Validation failures come
    /// back as 400 responses, never as errors.
    pub async fn respond(&self, request: &Request) -> Result<Response> {
        match TileDescriptor::from_request(request, &self.config) {
            Ok(descriptor) => self.synthesize(&descriptor).await,
            Err(rejection) => {
                debug!("Rejected tile request {}: {}", request.url, rejection);
                Ok(rejection.to_response())
            }
        }
    }

    /// Build the tile for a validated descriptor.
    ///
    /// A non-ok source response is returned unchanged. Without compositing
    /// support the source is returned as-is.
    pub async fn synthesize(&self, descriptor: &TileDescriptor) -> Result<Response> {
        let source_request = Request::get(descriptor.src.clone());

        let compositor = match &self.compositing {
            Compositing::Available(compositor) => compositor.clone(),
            Compositing::Unavailable => {
                debug!("Compositing unavailable, serving {} unmirrored", descriptor.src);
                return self.network.fetch(&source_request).await;
            }
        };

        let source = self.network.fetch(&source_request).await?;
        if !source.is_ok() {
            debug!(
                "Tile source {} returned {}, passing through",
                descriptor.src, source.status
            );
            return Ok(source);
        }

        let axis = descriptor.axis;
        let bytes = source.body.clone();
        let composite = tokio::task::spawn_blocking(move || compositor.mirror_tile(&bytes, axis))
            .await
            .map_err(|e| WorkerError::Other(format!("compositing task failed: {}", e)))?;

        match composite {
            Ok(png) => {
                debug!(
                    "Synthesized {}-axis tile for {} ({} bytes)",
                    axis,
                    descriptor.src,
                    png.len()
                );
                Ok(Response::new(200, png)
                    .with_header("Content-Type", "image/png")
                    .with_header("Cache-Control", self.config.tile_cache_control()))
            }
            Err(e) => {
                warn!("Tile synthesis for {} failed: {}", descriptor.src, e);
                Ok(e.to_response())
            }
        }
    }
}
