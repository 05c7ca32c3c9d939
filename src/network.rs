//! Network capability
//!
//! The worker performs every outbound request through [`Network`]. Tests
//! substitute deterministic fakes; the binary uses [`StaticDirNetwork`], which
//! answers same-origin requests from a site directory on disk.

use crate::error::{Result, WorkerError};
use crate::http::{Method, Request, Response};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::{Origin, Url};

/// Outbound fetch capability
///
/// `Err` means no response was obtained at all (connection failure, refused
/// request). An HTTP error status is an `Ok` response with `is_ok() == false`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Serves one origin from a directory
pub struct StaticDirNetwork {
    origin: Origin,
    root: PathBuf,
}

impl StaticDirNetwork {
    pub fn new(scope: &Url, root: impl Into<PathBuf>) -> Self {
        Self {
            origin: scope.origin(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL path onto the site directory. `None` for paths that try to
    /// escape the root.
    fn resolve(&self, url: &Url) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut last_is_dir = true;

        for segment in url.path_segments()? {
            if segment.is_empty() {
                last_is_dir = true;
                continue;
            }
            if segment == "." || segment == ".." || segment.contains('\\') {
                return None;
            }
            path.push(segment);
            last_is_dir = false;
        }

        if last_is_dir {
            path.push("index.html");
        }
        Some(path)
    }
}

#[async_trait]
impl Network for StaticDirNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        if request.url.origin() != self.origin {
            return Err(WorkerError::NetworkError(format!(
                "refusing cross-origin fetch of {}",
                request.url
            )));
        }

        if !matches!(request.method, Method::Get | Method::Head) {
            return Ok(Response::text(405, "Method Not Allowed").with_url(request.url.clone()));
        }

        let Some(path) = self.resolve(&request.url) else {
            return Ok(Response::text(404, "Not Found").with_url(request.url.clone()));
        };

        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No file for {} at {}", request.url, path.display());
                return Ok(Response::text(404, "Not Found").with_url(request.url.clone()));
            }
            Err(e) => {
                if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
                    return Ok(Response::text(404, "Not Found").with_url(request.url.clone()));
                }
                return Err(WorkerError::IoError(e));
            }
        };

        debug!("Served {} from {} ({} bytes)", request.url, path.display(), body.len());

        let body = if request.method == Method::Head { Vec::new() } else { body };
        Ok(Response::new(200, body)
            .with_header("Content-Type", content_type_for(&path))
            .with_url(request.url.clone()))
    }
}

/// Content type guessed from a file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> (TempDir, StaticDirNetwork) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::create_dir_all(dir.path().join("static")).unwrap();
        std::fs::write(dir.path().join("static/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let scope = Url::parse("http://localhost:8080/").unwrap();
        let network = StaticDirNetwork::new(&scope, dir.path());
        (dir, network)
    }

    #[tokio::test]
    async fn test_serves_files_with_content_type() {
        let (_dir, network) = site();

        let response = network
            .fetch(&Request::parse_get("http://localhost:8080/static/logo.png").unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("image/png"));
        assert_eq!(response.body.len(), 4);
    }

    #[tokio::test]
    async fn test_directory_maps_to_index() {
        let (_dir, network) = site();

        let response = network
            .fetch(&Request::parse_get("http://localhost:8080/").unwrap())
            .await
            .unwrap();
        assert_eq!(response.body, "<h1>home</h1>");
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let (_dir, network) = site();

        let response = network
            .fetch(&Request::parse_get("http://localhost:8080/nope.css").unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn test_cross_origin_is_refused() {
        let (_dir, network) = site();

        let result = network
            .fetch(&Request::parse_get("https://elsewhere.example/index.html").unwrap())
            .await;
        assert!(matches!(result, Err(WorkerError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_non_get_is_405() {
        let (_dir, network) = site();

        let url = Url::parse("http://localhost:8080/index.html").unwrap();
        let response = network.fetch(&Request::new(Method::Post, url)).await.unwrap();
        assert_eq!(response.status, 405);
    }

    #[test]
    fn test_content_type_guessing() {
        assert_eq!(content_type_for(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("main.css")), "text/css; charset=utf-8");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }
}
