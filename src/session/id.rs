//! Transport session identity and lifetime.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracking and log correlation
//! - Close tracked session state when the transport connection ends

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::session::tracker::SessionTracker;

/// Global counter for session IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one transport session (an HTTP/2 connection), not a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Guard tied to a transport session's lifetime.
/// Registers the session on creation and drops its state when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    tracker: Arc<SessionTracker>,
    id: SessionId,
}

impl SessionGuard {
    pub(crate) fn new(tracker: Arc<SessionTracker>) -> Self {
        let id = SessionId::new();
        tracker.open(id);
        Self { tracker, id }
    }

    /// Get this session's ID.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.tracker.close(self.id);
        tracing::trace!(session = %self.id, "Session closed");
    }
}
