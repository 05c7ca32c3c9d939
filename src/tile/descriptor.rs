//! Tile request parsing and validation

use crate::cache::WorkerConfig;
use crate::http::{Request, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// Axis along which the source is mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileAxis {
    /// Source on the left, mirror on the right
    X,
    /// Source on top, mirror below
    Y,
}

impl TileAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileAxis::X => "x",
            TileAxis::Y => "y",
        }
    }
}

impl fmt::Display for TileAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileAxis {
    type Err = TileRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(TileAxis::X),
            "y" => Ok(TileAxis::Y),
            _ => Err(TileRejection::BadAxis),
        }
    }
}

/// Why a tile request was refused. Every variant maps to a 400.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileRejection {
    #[error("Bad axis")]
    BadAxis,

    #[error("Missing src")]
    MissingSrc,

    #[error("Bad src origin")]
    BadSrcOrigin,

    #[error("Bad src path")]
    BadSrcPath,
}

impl TileRejection {
    pub fn status(&self) -> u16 {
        400
    }

    pub fn to_response(&self) -> Response {
        Response::text(self.status(), &self.to_string())
    }
}

/// A validated tile request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    pub axis: TileAxis,
    /// Source image, resolved against the request URL
    pub src: Url,
}

impl TileDescriptor {
    /// Parse `axis` and `src` from the query string and validate them.
    ///
    /// Checks run in a fixed order (axis, presence of src, origin, path) so
    /// a request with several problems always reports the first one.
    pub fn from_request(request: &Request, config: &WorkerConfig) -> Result<Self, TileRejection> {
        let mut axis = None;
        let mut src = None;
        for (name, value) in request.url.query_pairs() {
            match name.as_ref() {
                "axis" if axis.is_none() => axis = Some(value.into_owned()),
                "src" if src.is_none() => src = Some(value.into_owned()),
                _ => {}
            }
        }

        let axis: TileAxis = axis.as_deref().unwrap_or("").parse()?;

        let src = src
            .filter(|s| !s.is_empty())
            .ok_or(TileRejection::MissingSrc)?;

        let src = request
            .url
            .join(&src)
            .map_err(|_| TileRejection::BadSrcOrigin)?;

        if src.origin() != request.url.origin() {
            return Err(TileRejection::BadSrcOrigin);
        }

        if !src.path().starts_with(&config.static_prefix) {
            return Err(TileRejection::BadSrcPath);
        }

        Ok(Self { axis, src })
    }
}
