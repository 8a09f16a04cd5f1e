//! Static file serving

use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

/// Serves files from a single site root directory
#[derive(Debug, Clone)]
pub struct StaticFiles {
    /// Canonicalized root; every served path must stay below it
    root: PathBuf,
}

/// What a request path maps to under the site root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    /// A directory requested without its trailing slash
    Redirect(String),
    NotFound,
    Forbidden,
}

impl StaticFiles {
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref();
        let canon = root
            .canonicalize()
            .with_context(|| format!("site root {} does not exist", root.display()))?;
        if !canon.is_dir() {
            anyhow::bail!("site root {} is not a directory", root.display());
        }
        Ok(Self { root: canon })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path (without the leading slash) onto the filesystem.
    ///
    /// Directories resolve to their `index.html`. Anything that canonicalizes
    /// outside the root is forbidden, even if it exists.
    pub async fn resolve(&self, rel: &str) -> Resolved {
        let rel = rel.trim_start_matches('/');
        let requested = self.root.join(rel);

        let Ok(canon) = tokio::fs::canonicalize(&requested).await else {
            return Resolved::NotFound;
        };
        if !canon.starts_with(&self.root) {
            return Resolved::Forbidden;
        }

        let Ok(meta) = tokio::fs::metadata(&canon).await else {
            return Resolved::NotFound;
        };
        if meta.is_dir() {
            if !rel.is_empty() && !rel.ends_with('/') {
                return Resolved::Redirect(format!("/{}/", rel));
            }
            let index = canon.join("index.html");
            return match tokio::fs::metadata(&index).await {
                Ok(m) if m.is_file() => Resolved::File(index),
                _ => Resolved::NotFound,
            };
        }

        Resolved::File(canon)
    }

    /// Serve a file
    pub async fn serve(&self, rel: &str) -> Response {
        match self.resolve(rel).await {
            Resolved::File(path) => match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!("Serving {} ({} bytes)", path.display(), bytes.len());
                    (
                        StatusCode::OK,
                        [
                            (header::CONTENT_TYPE, guess_content_type(&path)),
                            (header::CACHE_CONTROL, "no-cache".to_string()),
                        ],
                        bytes,
                    )
                        .into_response()
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    (StatusCode::NOT_FOUND, "Not found").into_response()
                }
            },
            Resolved::Redirect(location) => (
                StatusCode::MOVED_PERMANENTLY,
                [(header::LOCATION, location)],
            )
                .into_response(),
            Resolved::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            Resolved::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
        }
    }
}

fn guess_content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}
