//! Push subsystem types and errors.

use thiserror::Error;

use crate::asset::AssetPath;
use crate::session::SessionId;

/// What the transport knows about an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Raw request path as received (prefix, query string and all).
    pub path: &'a str,
    /// Transport session the request arrived on.
    pub session: SessionId,
    /// Cache-state token presented by the client, if any.
    pub token: Option<&'a str>,
}

/// Result of the Normalize → Decide → Commit pass for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushDecision {
    /// Normalized request path; `None` when normalization failed.
    pub entry: Option<AssetPath>,
    /// Assets to push, in ranked order.
    pub push: Vec<AssetPath>,
    /// Token to attach to the response, always set.
    pub token: String,
    /// The incoming token was unusable and has been replaced.
    pub reset: bool,
}

/// Coarse outcome of a primary response, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    NotFound,
    Other,
}

impl ResponseStatus {
    /// Map an HTTP status code. `304 Not Modified` counts as success.
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 | 304 => ResponseStatus::Success,
            404 | 410 => ResponseStatus::NotFound,
            _ => ResponseStatus::Other,
        }
    }
}

/// One push to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushJob {
    pub path: AssetPath,
    /// Path the pushed request is promised for (prefix applied).
    pub request_path: String,
}

/// Failure of a single push attempt, as reported by the transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    /// Client cancelled or refused the pushed stream.
    #[error("client refused the pushed stream")]
    Refused,

    /// The pushed asset does not exist.
    #[error("pushed asset not found")]
    NotFound,

    /// Stream or session closed before the push could complete.
    #[error("stream closed before the push completed")]
    Closed,

    /// Client disabled server push for this connection.
    #[error("server push disabled by the client")]
    Disabled,

    /// The push request itself could not be built; never the client's fault.
    #[error("invalid push request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Final outcome of one push, fed back for bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The client already has it; not held against the dependency.
    Refused,
    NotFound,
    /// The client went away or cannot accept pushes; ignored.
    Abandoned,
    Failed(String),
}

impl PushOutcome {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            PushOutcome::Delivered => "delivered",
            PushOutcome::Refused => "refused",
            PushOutcome::NotFound => "not_found",
            PushOutcome::Abandoned => "abandoned",
            PushOutcome::Failed(_) => "failed",
        }
    }

    /// Whether this outcome counts against the dependency that caused it.
    pub fn is_negative(&self) -> bool {
        matches!(self, PushOutcome::NotFound | PushOutcome::Failed(_))
    }
}

impl From<PushError> for PushOutcome {
    fn from(err: PushError) -> Self {
        match err {
            PushError::Refused => PushOutcome::Refused,
            PushError::NotFound => PushOutcome::NotFound,
            PushError::Closed | PushError::Disabled | PushError::InvalidRequest(_) => {
                PushOutcome::Abandoned
            }
            PushError::Transport(reason) => PushOutcome::Failed(reason),
        }
    }
}
