//! Request classification
//!
//! A pure function of the request and the configuration: no storage or
//! network access happens here, so routing can be tested in isolation.

use crate::cache::{CacheCategory, WorkerConfig};
use crate::http::{Method, Request};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class assigned to an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Mirror-tile generation endpoint
    Tile,

    /// `.jpg`/`.png` under the static segment
    StaticImage,

    /// Everything else: documents, stylesheets, scripts
    Core,
}

impl RequestClass {
    /// Namespace serving this class
    pub fn category(&self) -> CacheCategory {
        match self {
            RequestClass::Tile => CacheCategory::Tile,
            RequestClass::StaticImage => CacheCategory::Image,
            RequestClass::Core => CacheCategory::Core,
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::Tile => write!(f, "tile"),
            RequestClass::StaticImage => write!(f, "static_image"),
            RequestClass::Core => write!(f, "core"),
        }
    }
}

/// Why a request was left to default handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    NonGet(Method),
    CrossOrigin,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::NonGet(method) => write!(f, "non-GET method {}", method),
            DeclineReason::CrossOrigin => write!(f, "cross-origin request"),
        }
    }
}

/// Routing decision for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Not intercepted; the host performs default handling
    Decline(DeclineReason),

    /// Intercepted and handled by the policy for this class
    Route(RequestClass),
}

impl Decision {
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Decision::Route(_))
    }

    pub fn class(&self) -> Option<RequestClass> {
        match self {
            Decision::Route(class) => Some(*class),
            Decision::Decline(_) => None,
        }
    }
}

/// Classify a request. Rules are checked in order: tile suffix, static
/// image, then the core fallback.
pub fn classify(request: &Request, config: &WorkerConfig) -> Decision {
    if request.method != Method::Get {
        return Decision::Decline(DeclineReason::NonGet(request.method));
    }

    if request.url.origin() != config.origin() {
        return Decision::Decline(DeclineReason::CrossOrigin);
    }

    let path = request.url.path();

    if path.ends_with(&config.tile_suffix) {
        return Decision::Route(RequestClass::Tile);
    }

    if is_static_image(path, config) {
        return Decision::Route(RequestClass::StaticImage);
    }

    Decision::Route(RequestClass::Core)
}

fn is_static_image(path: &str, config: &WorkerConfig) -> bool {
    path.contains(&config.static_prefix)
        && config
            .image_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
}
