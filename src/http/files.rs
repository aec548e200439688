//! Static asset loading.
//!
//! # Responsibilities
//! - Map canonical asset paths onto the configured root directory
//! - Read files asynchronously and pick a content type
//!
//! # Design Decisions
//! - Paths arrive already canonical (no `..`), so joining segments onto the
//!   root cannot escape it
//! - Directories serve their `index.html`

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::asset::AssetPath;
use crate::config::AssetsConfig;

const INDEX_FILE: &str = "index.html";

#[derive(Debug, Error)]
pub enum FileError {
    #[error("asset not found")]
    NotFound,

    #[error("failed to read asset: {0}")]
    Io(#[from] io::Error),
}

/// A loaded asset ready to be written to a stream.
#[derive(Debug, Clone)]
pub struct Asset {
    pub body: Bytes,
    pub content_type: &'static str,
}

/// Serves assets from a root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: Arc<Path>,
    cache_control: Arc<str>,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, cache_control: &str) -> Self {
        Self {
            root: Arc::from(root.into()),
            cache_control: Arc::from(cache_control),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(config.root.clone(), &config.cache_control)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_control(&self) -> &str {
        &self.cache_control
    }

    /// Filesystem location of an asset.
    pub fn resolve(&self, path: &AssetPath) -> PathBuf {
        let mut resolved = self.root.to_path_buf();
        for segment in path.as_str().split('/').filter(|s| !s.is_empty()) {
            resolved.push(segment);
        }
        if path.is_root() {
            resolved.push(INDEX_FILE);
        }
        resolved
    }

    pub async fn load(&self, path: &AssetPath) -> Result<Asset, FileError> {
        let mut file = self.resolve(path);
        let mut mime = content_type(path.extension());

        let metadata = tokio::fs::metadata(&file).await.map_err(not_found)?;
        if metadata.is_dir() {
            file.push(INDEX_FILE);
            mime = content_type_for(&file);
        }

        let body = tokio::fs::read(&file).await.map_err(not_found)?;
        Ok(Asset {
            body: Bytes::from(body),
            content_type: mime,
        })
    }
}

fn not_found(err: io::Error) -> FileError {
    if err.kind() == io::ErrorKind::NotFound {
        FileError::NotFound
    } else {
        FileError::Io(err)
    }
}

fn content_type_for(file: &Path) -> &'static str {
    content_type(file.extension().and_then(|ext| ext.to_str()))
}

/// Content type for a file extension. Extensionless assets are documents.
pub fn content_type(extension: Option<&str>) -> &'static str {
    let Some(ext) = extension else {
        return "text/html; charset=utf-8";
    };
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
