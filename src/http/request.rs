//! Request identification and origin extraction.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) per stream
//! - Work out the origin pushed requests are promised under
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Pushed requests reuse the primary request's scheme and authority

use http::uri::{Authority, PathAndQuery, Scheme};
use http::Uri;
use std::fmt;
use uuid::Uuid;

/// Header carrying the request ID on responses.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a single request stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Scheme and authority of the primary request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    scheme: Scheme,
    authority: Authority,
}

impl Origin {
    /// Origin of `uri`, falling back to `http://localhost` for missing parts.
    pub fn of(uri: &Uri) -> Self {
        Self {
            scheme: uri.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority: uri
                .authority()
                .cloned()
                .unwrap_or_else(|| Authority::from_static("localhost")),
        }
    }

    /// Absolute URI for `path` under this origin.
    pub fn uri(&self, path: &str) -> Result<Uri, http::Error> {
        let path_and_query = PathAndQuery::try_from(path)?;
        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?)
    }
}
