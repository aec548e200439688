//! Request path canonicalization.
//!
//! # Responsibilities
//! - Drop query string and fragment
//! - Percent-decode and reject traversal sequences
//! - Strip the configured prefix exactly once
//! - Map canonical paths back to request paths for pushing
//!
//! # Design Decisions
//! - Repeated slashes collapse, trailing slashes are dropped (root excepted)
//! - `.` and `..` segments are rejected rather than resolved

use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Canonical key identifying a resource, relative to the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AssetPath(String);

impl AssetPath {
    /// The root asset (`/`).
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Accept a path that must already be canonical.
    ///
    /// Used for values coming back from clients (cache-state tokens), where
    /// anything not in canonical form is treated as corruption.
    pub fn from_canonical(path: &str) -> Result<Self, PathError> {
        if !path.starts_with('/') {
            return Err(PathError::Relative);
        }
        let normalized = collapse_segments(path)?;
        if normalized != path {
            return Err(PathError::NotCanonical);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Extension of the last segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        match self.file_name().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Whether this path looks like a page that pulls in sub-resources.
    ///
    /// Extensionless paths (directories, pretty URLs) always qualify.
    pub fn is_document(&self, entry_extensions: &[String]) -> bool {
        match self.extension() {
            None => true,
            Some(ext) => entry_extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext)),
        }
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AssetPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Reasons a request path cannot be mapped onto an [`AssetPath`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path must start with '/'")]
    Relative,

    #[error("path is not valid percent-encoded UTF-8")]
    Encoding,

    #[error("path contains a forbidden character")]
    ForbiddenChar,

    #[error("path contains a traversal segment")]
    Traversal,

    #[error("path does not start with prefix {prefix}")]
    PrefixMismatch { prefix: String },

    #[error("path is empty after stripping the prefix")]
    Empty,

    #[error("path is not in canonical form")]
    NotCanonical,
}

impl PathError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            PathError::Relative => "relative",
            PathError::Encoding => "encoding",
            PathError::ForbiddenChar => "forbidden_char",
            PathError::Traversal => "traversal",
            PathError::PrefixMismatch { .. } => "prefix_mismatch",
            PathError::Empty => "empty",
            PathError::NotCanonical => "not_canonical",
        }
    }
}

/// Canonicalizes raw request paths against a configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNormalizer {
    /// Empty for the root prefix, otherwise `/segment[/segment...]`.
    prefix: String,
}

impl PathNormalizer {
    /// Create a normalizer for the given prefix (`"/"`, `"static"`, `"/static/"` ...).
    pub fn new(prefix: &str) -> Self {
        let segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
        let prefix = if segments.is_empty() {
            String::new()
        } else {
            format!("/{}", segments.join("/"))
        };
        Self { prefix }
    }

    /// The prefix as matched against request paths (empty for root).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Canonicalize a raw request path.
    pub fn normalize(&self, raw: &str) -> Result<AssetPath, PathError> {
        let end = raw.find(|c: char| c == '?' || c == '#').unwrap_or(raw.len());
        let raw = &raw[..end];
        if !raw.starts_with('/') {
            return Err(PathError::Relative);
        }

        let decoded = urlencoding::decode(raw).map_err(|_| PathError::Encoding)?;
        let canonical = collapse_segments(&decoded)?;

        if self.prefix.is_empty() {
            return Ok(AssetPath(canonical));
        }
        match canonical.strip_prefix(self.prefix.as_str()) {
            Some("") | Some("/") => Err(PathError::Empty),
            Some(rest) if rest.starts_with('/') => Ok(AssetPath(rest.to_string())),
            _ => Err(PathError::PrefixMismatch {
                prefix: self.prefix.clone(),
            }),
        }
    }

    /// Request path the transport should use for an asset.
    ///
    /// The prefix is re-applied and every segment percent-encoded, so the
    /// result is a valid URI path that normalizes back to `asset`.
    pub fn request_path(&self, asset: &AssetPath) -> String {
        let prefix = encode_segments(&self.prefix);
        if asset.is_root() {
            format!("{}/", prefix)
        } else {
            format!("{}{}", prefix, encode_segments(&asset.0))
        }
    }
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new("/")
    }
}

/// Percent-encode each `/`-separated segment of a canonical path.
fn encode_segments(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(&urlencoding::encode(segment));
    }
    out
}

/// Collapse a decoded, absolute path into canonical segment form.
fn collapse_segments(path: &str) -> Result<String, PathError> {
    if path.contains('\0') || path.contains('\\') {
        return Err(PathError::ForbiddenChar);
    }

    let mut out = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(PathError::Traversal);
        }
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}
