//! Configuration for the worker: namespace naming, versioning and routing

use crate::cache::types::{CacheCategory, NamespaceName};
use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::{Origin, Url};

const DEFAULT_SCOPE: &str = "http://localhost:8080/";

/// One year, the longest max-age browsers honor in practice
const DEFAULT_TILE_MAX_AGE_SECS: u64 = 31_536_000;

/// Environment variable prefix used by [`WorkerConfig::from_env`]
pub const ENV_PREFIX: &str = "OFFLINE_TILES_";

/// Configuration for the offline cache worker
///
/// Namespace names are `"{cache_prefix}-{label}-{version}"`. Changing
/// `version` is the only cache-busting mechanism: on the next activation every
/// namespace carrying the prefix but a different version is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Base URL the worker controls; its origin is the serving origin
    pub scope: Url,

    /// Reserved prefix shared by every namespace this worker owns
    pub cache_prefix: String,

    /// Current cache generation
    pub version: String,

    /// Paths pre-populated into the core namespace at install,
    /// resolved against `scope`
    pub core_assets: Vec<String>,

    /// Path suffix that marks a tile-generation request
    pub tile_suffix: String,

    /// Path segment holding static assets
    pub static_prefix: String,

    /// Extensions (including the dot) treated as static images
    pub image_extensions: Vec<String>,

    /// `max-age` advertised on synthesized tiles
    pub tile_max_age_secs: u64,

    /// Largest composite surface, in pixels, the compositor will allocate
    pub max_tile_pixels: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scope: Url::parse(DEFAULT_SCOPE).expect("default scope is a valid URL"),
            cache_prefix: "lissikk".to_string(),
            version: "v2".to_string(),
            core_assets: vec![
                "./".to_string(),
                "./index.html".to_string(),
                "./styles/css/main.css".to_string(),
            ],
            tile_suffix: "/__tile".to_string(),
            static_prefix: "/static/".to_string(),
            image_extensions: vec![".jpg".to_string(), ".png".to_string()],
            tile_max_age_secs: DEFAULT_TILE_MAX_AGE_SECS,
            // 8192 x 8192
            max_tile_pixels: 67_108_864,
        }
    }
}

impl WorkerConfig {
    /// Create a new builder for worker configuration
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_prefix.is_empty() {
            return Err(WorkerError::ConfigError("cache_prefix must not be empty".to_string()));
        }

        if self.version.is_empty() {
            return Err(WorkerError::ConfigError("version must not be empty".to_string()));
        }

        if self.version.contains('-') {
            return Err(WorkerError::ConfigError(
                "version must not contain '-' (it is the namespace separator)".to_string(),
            ));
        }

        if self.tile_suffix.is_empty() {
            return Err(WorkerError::ConfigError("tile_suffix must not be empty".to_string()));
        }

        if !self.static_prefix.starts_with('/') {
            return Err(WorkerError::ConfigError(
                "static_prefix must be an absolute path".to_string(),
            ));
        }

        if self.image_extensions.iter().any(|ext| !ext.starts_with('.')) {
            return Err(WorkerError::ConfigError(
                "image_extensions must start with '.'".to_string(),
            ));
        }

        if self.max_tile_pixels == 0 {
            return Err(WorkerError::ConfigError(
                "max_tile_pixels must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.scope.scheme(), "http" | "https") {
            return Err(WorkerError::ConfigError(format!(
                "scope must be an http(s) URL, got {}",
                self.scope
            )));
        }

        let origin = self.origin();
        for url in self.core_asset_urls()? {
            if url.origin() != origin {
                return Err(WorkerError::ConfigError(format!(
                    "core asset {} is not same-origin with scope",
                    url
                )));
            }
        }

        Ok(())
    }

    /// The serving origin
    pub fn origin(&self) -> Origin {
        self.scope.origin()
    }

    /// Name of the current namespace for a category
    pub fn namespace_name(&self, category: CacheCategory) -> NamespaceName {
        format!("{}-{}-{}", self.cache_prefix, category.label(), self.version)
    }

    /// Prefix every owned namespace starts with
    pub fn reserved_prefix(&self) -> String {
        format!("{}-", self.cache_prefix)
    }

    /// True for namespaces this worker owns that belong to another version
    pub fn is_stale_namespace(&self, name: &str) -> bool {
        name.starts_with(&self.reserved_prefix()) && !name.ends_with(&self.version)
    }

    /// Core manifest resolved against the scope
    pub fn core_asset_urls(&self) -> Result<Vec<Url>> {
        self.core_assets
            .iter()
            .map(|path| self.scope.join(path).map_err(WorkerError::from))
            .collect()
    }

    /// `Cache-Control` value attached to synthesized tiles
    pub fn tile_cache_control(&self) -> String {
        format!("public, max-age={}, immutable", self.tile_max_age_secs)
    }

    /// Load configuration from `OFFLINE_TILES_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(format!("{}{}", ENV_PREFIX, name)).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Names are given without the `OFFLINE_TILES_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(scope) = lookup("SCOPE") {
            builder = builder.scope(Url::parse(&scope)?);
        }
        if let Some(prefix) = lookup("CACHE_PREFIX") {
            builder = builder.cache_prefix(prefix);
        }
        if let Some(version) = lookup("VERSION") {
            builder = builder.version(version);
        }
        if let Some(assets) = lookup("CORE_ASSETS") {
            builder = builder.core_assets(split_list(&assets));
        }
        if let Some(extensions) = lookup("IMAGE_EXTENSIONS") {
            builder = builder.image_extensions(split_list(&extensions));
        }
        if let Some(suffix) = lookup("TILE_SUFFIX") {
            builder = builder.tile_suffix(suffix);
        }
        if let Some(prefix) = lookup("STATIC_PREFIX") {
            builder = builder.static_prefix(prefix);
        }
        if let Some(max_age) = lookup("TILE_MAX_AGE_SECS") {
            let secs = max_age.parse().map_err(|_| {
                WorkerError::ConfigError(format!("invalid TILE_MAX_AGE_SECS: {}", max_age))
            })?;
            builder = builder.tile_max_age_secs(secs);
        }
        if let Some(max_pixels) = lookup("MAX_TILE_PIXELS") {
            let pixels = max_pixels.parse().map_err(|_| {
                WorkerError::ConfigError(format!("invalid MAX_TILE_PIXELS: {}", max_pixels))
            })?;
            builder = builder.max_tile_pixels(pixels);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}

/// Comma-separated list, trimmed, empty items dropped
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Builder for worker configuration
#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    scope: Option<Url>,
    cache_prefix: Option<String>,
    version: Option<String>,
    core_assets: Option<Vec<String>>,
    tile_suffix: Option<String>,
    static_prefix: Option<String>,
    image_extensions: Option<Vec<String>>,
    tile_max_age_secs: Option<u64>,
    max_tile_pixels: Option<u64>,
}

impl WorkerConfigBuilder {
    /// Set the scope URL
    pub fn scope(mut self, scope: Url) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Set the reserved namespace prefix
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = Some(prefix.into());
        self
    }

    /// Set the cache version tag
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the core asset manifest
    pub fn core_assets(mut self, assets: Vec<String>) -> Self {
        self.core_assets = Some(assets);
        self
    }

    /// Set the tile endpoint suffix
    pub fn tile_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.tile_suffix = Some(suffix.into());
        self
    }

    /// Set the static asset path segment
    pub fn static_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.static_prefix = Some(prefix.into());
        self
    }

    /// Set the static image extensions
    pub fn image_extensions(mut self, extensions: Vec<String>) -> Self {
        self.image_extensions = Some(extensions);
        self
    }

    /// Set the tile `max-age`
    pub fn tile_max_age_secs(mut self, secs: u64) -> Self {
        self.tile_max_age_secs = Some(secs);
        self
    }

    /// Set the composite surface ceiling
    pub fn max_tile_pixels(mut self, pixels: u64) -> Self {
        self.max_tile_pixels = Some(pixels);
        self
    }

    /// Build the worker configuration
    pub fn build(self) -> WorkerConfig {
        let defaults = WorkerConfig::default();

        WorkerConfig {
            scope: self.scope.unwrap_or(defaults.scope),
            cache_prefix: self.cache_prefix.unwrap_or(defaults.cache_prefix),
            version: self.version.unwrap_or(defaults.version),
            core_assets: self.core_assets.unwrap_or(defaults.core_assets),
            tile_suffix: self.tile_suffix.unwrap_or(defaults.tile_suffix),
            static_prefix: self.static_prefix.unwrap_or(defaults.static_prefix),
            image_extensions: self.image_extensions.unwrap_or(defaults.image_extensions),
            tile_max_age_secs: self.tile_max_age_secs.unwrap_or(defaults.tile_max_age_secs),
            max_tile_pixels: self.max_tile_pixels.unwrap_or(defaults.max_tile_pixels),
        }
    }
}
