//! Per-session push bookkeeping.
//!
//! # Responsibilities
//! - Remember what was pushed or requested on each live session
//! - Hold each session's learning anchor (the entry path follow-up requests
//!   are credited to)
//! - Reclaim sessions that vanished without a close signal
//!
//! # Design Decisions
//! - Sharded by session ID; sessions never contend with each other
//! - Marks are idempotent set inserts, so racing requests converge
//! - Only `open` creates state; work arriving for a closed or reaped
//!   session is dropped

use dashmap::DashMap;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

use crate::asset::AssetPath;
use crate::observability::metrics;
use crate::session::id::SessionId;

/// The entry path a session's follow-up requests are credited to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub path: AssetPath,
    pub observed_at: Instant,
}

/// How a completed request fits into its session's learning state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    /// Follows the contained live anchor; credit (or debit) that edge.
    Dependency(AssetPath),
    /// Became the session's new anchor.
    Anchored,
    /// Neither.
    Ignored,
}

#[derive(Debug)]
struct SessionState {
    pushed: HashSet<AssetPath>,
    requested: HashSet<AssetPath>,
    anchor: Option<Anchor>,
    last_activity: Instant,
}

impl SessionState {
    fn new(now: Instant) -> Self {
        Self {
            pushed: HashSet::new(),
            requested: HashSet::new(),
            anchor: None,
            last_activity: now,
        }
    }
}

/// Tracks live transport sessions.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: DashMap<SessionId, SessionState>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id`. Reopening a live session keeps its state.
    pub fn open(&self, id: SessionId) {
        let now = Instant::now();
        let created = {
            let mut created = false;
            self.sessions.entry(id).or_insert_with(|| {
                created = true;
                SessionState::new(now)
            });
            created
        };
        if created {
            metrics::record_active_sessions(self.sessions.len());
        }
    }

    /// True only if `path` was neither pushed nor requested on this session.
    pub fn should_push(&self, id: SessionId, path: &AssetPath) -> bool {
        match self.sessions.get(&id) {
            Some(state) => !state.pushed.contains(path) && !state.requested.contains(path),
            None => true,
        }
    }

    pub fn mark_pushed(&self, id: SessionId, path: &AssetPath) {
        self.with_session(id, Instant::now(), |state| {
            state.pushed.insert(path.clone());
        });
    }

    pub fn mark_requested(&self, id: SessionId, path: &AssetPath) {
        self.with_session(id, Instant::now(), |state| {
            state.requested.insert(path.clone());
        });
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Classify a completed request against the session's anchor.
    ///
    /// A request within `window` of the live anchor that is not itself an
    /// entry document is a dependency of that anchor. A successful entry
    /// document, or any successful request when no anchor is live, becomes
    /// the new anchor.
    pub fn observe(
        &self,
        id: SessionId,
        path: &AssetPath,
        is_entry: bool,
        success: bool,
        window: Duration,
    ) -> Observed {
        self.observe_at(id, path, is_entry, success, window, Instant::now())
    }

    pub(crate) fn observe_at(
        &self,
        id: SessionId,
        path: &AssetPath,
        is_entry: bool,
        success: bool,
        window: Duration,
        now: Instant,
    ) -> Observed {
        let observed = self.with_session(id, now, |state| {
            let live: Option<AssetPath> = state
                .anchor
                .as_ref()
                .filter(|a| now.saturating_duration_since(a.observed_at) <= window)
                .map(|a| a.path.clone());

            match &live {
                Some(anchor) if anchor != path && !is_entry => {
                    return Observed::Dependency(anchor.clone());
                }
                Some(anchor) if anchor == path => {
                    if success {
                        state.anchor = Some(Anchor {
                            path: path.clone(),
                            observed_at: now,
                        });
                    }
                    return Observed::Ignored;
                }
                _ => {}
            }

            if success && (is_entry || live.is_none()) {
                state.anchor = Some(Anchor {
                    path: path.clone(),
                    observed_at: now,
                });
                Observed::Anchored
            } else {
                Observed::Ignored
            }
        });
        observed.unwrap_or(Observed::Ignored)
    }

    /// Current anchor path of a session, regardless of age.
    pub fn anchor(&self, id: SessionId) -> Option<AssetPath> {
        self.sessions
            .get(&id)
            .and_then(|state| state.anchor.as_ref().map(|a| a.path.clone()))
    }

    /// Drop a session's state. Returns whether it existed.
    pub fn close(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            metrics::record_active_sessions(self.sessions.len());
        }
        removed
    }

    /// Drop sessions idle for longer than `timeout`. Returns how many.
    pub fn reap_idle(&self, timeout: Duration) -> usize {
        self.reap_idle_at(timeout, Instant::now())
    }

    pub(crate) fn reap_idle_at(&self, timeout: Duration, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, state| now.saturating_duration_since(state.last_activity) <= timeout);
        let after = self.sessions.len();
        metrics::record_active_sessions(after);
        before.saturating_sub(after)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run `f` on a live session. Unknown sessions are left alone.
    fn with_session<R>(
        &self,
        id: SessionId,
        now: Instant,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Option<R> {
        let mut state = self.sessions.get_mut(&id)?;
        state.last_activity = now;
        Some(f(&mut state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> AssetPath {
        AssetPath::from_canonical(p).unwrap()
    }

    const WINDOW: Duration = Duration::from_secs(1);

    #[test]
    fn marks_are_idempotent() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        let main = path("/main.js");

        assert!(tracker.should_push(id, &main));
        tracker.mark_pushed(id, &main);
        assert!(!tracker.should_push(id, &main));
        tracker.mark_pushed(id, &main);
        assert!(!tracker.should_push(id, &main));
        assert!(!tracker.should_push(id, &main));
    }

    #[test]
    fn requested_paths_are_not_pushed() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        tracker.mark_requested(id, &path("/site.css"));
        assert!(!tracker.should_push(id, &path("/site.css")));
        assert!(tracker.should_push(id, &path("/main.js")));
    }

    #[test]
    fn sessions_are_isolated() {
        let tracker = SessionTracker::new();
        let (a, b) = (SessionId::new(), SessionId::new());
        tracker.open(a);
        tracker.open(b);
        tracker.mark_pushed(a, &path("/main.js"));
        assert!(tracker.should_push(b, &path("/main.js")));
    }

    #[test]
    fn follow_up_within_window_is_a_dependency() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        let t0 = Instant::now();
        let index = path("/index.html");

        assert_eq!(
            tracker.observe_at(id, &index, true, true, WINDOW, t0),
            Observed::Anchored
        );
        assert_eq!(
            tracker.observe_at(id, &path("/main.js"), false, true, WINDOW, t0 + Duration::from_millis(200)),
            Observed::Dependency(index.clone())
        );
        // Failures are still attributed so the edge can be weakened.
        assert_eq!(
            tracker.observe_at(id, &path("/gone.js"), false, false, WINDOW, t0 + Duration::from_millis(300)),
            Observed::Dependency(index)
        );
    }

    #[test]
    fn expired_anchor_is_replaced() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        let t0 = Instant::now();
        tracker.observe_at(id, &path("/index.html"), true, true, WINDOW, t0);

        let late = t0 + Duration::from_secs(5);
        assert_eq!(
            tracker.observe_at(id, &path("/main.js"), false, true, WINDOW, late),
            Observed::Anchored
        );
        assert_eq!(tracker.anchor(id), Some(path("/main.js")));
    }

    #[test]
    fn navigation_moves_the_anchor() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        let t0 = Instant::now();
        tracker.observe_at(id, &path("/index.html"), true, true, WINDOW, t0);

        let next = t0 + Duration::from_millis(100);
        assert_eq!(
            tracker.observe_at(id, &path("/about.html"), true, true, WINDOW, next),
            Observed::Anchored
        );
        assert_eq!(tracker.anchor(id), Some(path("/about.html")));
    }

    #[test]
    fn failed_request_never_anchors() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        let t0 = Instant::now();
        assert_eq!(
            tracker.observe_at(id, &path("/missing.html"), true, false, WINDOW, t0),
            Observed::Ignored
        );
        assert_eq!(tracker.anchor(id), None);
    }

    #[test]
    fn idle_sessions_are_reaped() {
        let tracker = SessionTracker::new();
        let (stale, fresh) = (SessionId::new(), SessionId::new());
        tracker.open(stale);
        tracker.open(fresh);
        tracker.mark_requested(stale, &path("/a.js"));
        tracker.mark_requested(fresh, &path("/b.js"));

        let later = Instant::now() + Duration::from_secs(120);
        tracker.observe_at(fresh, &path("/b.js"), false, true, WINDOW, later);

        assert_eq!(tracker.reap_idle_at(Duration::from_secs(60), later), 1);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.should_push(stale, &path("/a.js")));
        assert!(!tracker.should_push(fresh, &path("/b.js")));
    }

    #[test]
    fn close_removes_state() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        tracker.mark_pushed(id, &path("/main.js"));
        assert!(tracker.close(id));
        assert!(!tracker.close(id));
        assert!(tracker.should_push(id, &path("/main.js")));
    }

    #[test]
    fn closed_sessions_are_not_resurrected() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        let t0 = Instant::now();
        tracker.observe_at(id, &path("/index.html"), true, true, WINDOW, t0);
        tracker.mark_pushed(id, &path("/main.js"));
        assert!(tracker.close(id));

        // A stream task finishing after its connection closed.
        tracker.mark_requested(id, &path("/late.js"));
        tracker.mark_pushed(id, &path("/late.js"));
        assert_eq!(
            tracker.observe_at(id, &path("/late.js"), false, true, WINDOW, t0),
            Observed::Ignored
        );
        assert!(!tracker.contains(id));
        assert!(tracker.is_empty());
    }

    #[test]
    fn reopening_keeps_state() {
        let tracker = SessionTracker::new();
        let id = SessionId::new();
        tracker.open(id);
        tracker.mark_pushed(id, &path("/main.js"));
        tracker.open(id);
        assert!(!tracker.should_push(id, &path("/main.js")));
        assert_eq!(tracker.len(), 1);
    }
}
