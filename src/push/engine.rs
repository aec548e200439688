//! Push decision engine.
//!
//! # Responsibilities
//! - Run Normalize → Decide → Commit for every primary request
//! - Start push issuance on the transport's stream
//! - Feed response and push outcomes back into the learner and tracker
//!
//! # Design Decisions
//! - `Clone` handle over shared state; one engine serves every connection
//! - Tunables live behind `ArcSwap` so a config reload never blocks requests
//! - Nothing here fails the primary response: every error degrades to
//!   "push nothing"

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

use crate::asset::{AssetPath, PathNormalizer};
use crate::config::AutoPushConfig;
use crate::learner::{DependencyLearner, LearnerLimits};
use crate::observability::metrics;
use crate::push::executor::{self, PushHandle, PushStream};
use crate::push::types::{
    PushDecision, PushJob, PushOutcome, RequestContext, ResponseStatus,
};
use crate::session::{Observed, SessionGuard, SessionId, SessionTracker};
use crate::token::{Decoded, TokenCodec};

/// Per-request tunables, swapped as a unit on reload.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub enabled: bool,
    pub normalizer: PathNormalizer,
    pub codec: TokenCodec,
    pub entry_extensions: Vec<String>,
    pub learning_window: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &AutoPushConfig) -> Self {
        Self {
            enabled: config.push.enabled,
            normalizer: PathNormalizer::new(&config.assets.prefix),
            codec: TokenCodec::new(config.token.max_token_bytes),
            entry_extensions: config.assets.entry_extensions.clone(),
            learning_window: Duration::from_millis(config.learner.learning_window_ms),
        }
    }
}

/// What the transport needs after `on_request`.
#[derive(Debug)]
pub struct RequestOutcome {
    /// Token to attach to the primary response.
    pub token: String,
    /// Paths whose pushes were started, in ranked order.
    pub pushed: Vec<AssetPath>,
    /// In-flight deliveries; `None` when nothing was pushed.
    pub report: Option<PushHandle>,
}

struct EngineInner {
    settings: ArcSwap<EngineSettings>,
    learner: DependencyLearner,
    tracker: Arc<SessionTracker>,
}

/// Adaptive push engine shared by every connection.
#[derive(Clone)]
pub struct PushEngine {
    inner: Arc<EngineInner>,
}

impl PushEngine {
    pub fn new(config: &AutoPushConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                settings: ArcSwap::from_pointee(EngineSettings::from_config(config)),
                learner: DependencyLearner::new(LearnerLimits::new(&config.learner, &config.push)),
                tracker: Arc::new(SessionTracker::new()),
            }),
        }
    }

    /// Apply a new configuration. Learned data and sessions are kept.
    pub fn reload(&self, config: &AutoPushConfig) {
        self.inner
            .settings
            .store(Arc::new(EngineSettings::from_config(config)));
        self.inner
            .learner
            .reload(LearnerLimits::new(&config.learner, &config.push));
        tracing::info!(
            push_enabled = config.push.enabled,
            max_fan_out = config.push.max_fan_out,
            "Push engine configuration reloaded"
        );
    }

    pub fn settings(&self) -> Arc<EngineSettings> {
        self.inner.settings.load_full()
    }

    pub fn learner(&self) -> &DependencyLearner {
        &self.inner.learner
    }

    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.inner.tracker
    }

    /// Start tracking a new transport session.
    pub fn open_session(&self) -> SessionGuard {
        let guard = SessionGuard::new(self.inner.tracker.clone());
        tracing::trace!(session = %guard.id(), "Session opened");
        guard
    }

    /// Drop a session's state ahead of its guard.
    pub fn close_session(&self, id: SessionId) {
        self.inner.tracker.close(id);
    }

    /// Decide and commit the push set for a request without issuing pushes.
    pub fn decide(&self, ctx: &RequestContext<'_>) -> PushDecision {
        let settings = self.inner.settings.load();
        let Decoded { mut state, reset } = settings.codec.decode(ctx.token.unwrap_or(""));
        if reset {
            tracing::debug!(session = %ctx.session, "Discarded unusable cache token");
            metrics::record_token_reset();
        }

        let entry = match settings.normalizer.normalize(ctx.path) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(
                    session = %ctx.session,
                    raw = ctx.path,
                    error = %e,
                    "Skipping push for unusable request path"
                );
                metrics::record_path_rejection(e.reason());
                return PushDecision {
                    entry: None,
                    push: Vec::new(),
                    token: settings.codec.encode(&state),
                    reset,
                };
            }
        };

        let push: Vec<AssetPath> = if settings.enabled {
            self.inner
                .learner
                .suggested_push_set(&entry)
                .into_iter()
                .filter(|path| !state.contains(path))
                .filter(|path| self.inner.tracker.should_push(ctx.session, path))
                .collect()
        } else {
            Vec::new()
        };

        state.insert_batch(&push);
        let token = settings.codec.encode(&state);
        for path in &push {
            self.inner.tracker.mark_pushed(ctx.session, path);
        }

        metrics::record_decision(push.len());
        tracing::debug!(
            session = %ctx.session,
            entry = %entry,
            pushes = push.len(),
            known = state.len(),
            "Push decision"
        );

        PushDecision {
            entry: Some(entry),
            push,
            token,
            reset,
        }
    }

    /// Decide, commit, and start pushes on `stream`.
    ///
    /// Promises are issued before this returns; bodies are delivered in the
    /// background and their outcomes fed back through `on_push_outcome`.
    pub fn on_request<S: PushStream>(&self, ctx: &RequestContext<'_>, stream: &S) -> RequestOutcome {
        let decision = self.decide(ctx);
        let entry = match decision.entry {
            Some(entry) if !decision.push.is_empty() => entry,
            _ => {
                return RequestOutcome {
                    token: decision.token,
                    pushed: Vec::new(),
                    report: None,
                }
            }
        };

        let settings = self.inner.settings.load();
        let jobs: Vec<PushJob> = decision
            .push
            .iter()
            .map(|path| PushJob {
                path: path.clone(),
                request_path: settings.normalizer.request_path(path),
            })
            .collect();

        let engine = self.clone();
        let session = ctx.session;
        let handle = executor::execute(stream, jobs, move |path, outcome| {
            engine.on_push_outcome(session, &entry, path, outcome)
        });

        RequestOutcome {
            token: decision.token,
            pushed: decision.push,
            report: Some(handle),
        }
    }

    /// Record the outcome of a primary response.
    pub fn on_response(&self, session: SessionId, raw_path: &str, status: ResponseStatus) {
        let settings = self.inner.settings.load();
        let Ok(path) = settings.normalizer.normalize(raw_path) else {
            return;
        };

        self.inner.tracker.mark_requested(session, &path);
        let success = match status {
            ResponseStatus::Success => true,
            ResponseStatus::NotFound => false,
            ResponseStatus::Other => return,
        };

        let is_entry = path.is_document(&settings.entry_extensions);
        match self.inner.tracker.observe(
            session,
            &path,
            is_entry,
            success,
            settings.learning_window,
        ) {
            Observed::Dependency(anchor) => {
                self.inner.learner.record_outcome(&anchor, &path, success);
                tracing::trace!(session = %session, entry = %anchor, path = %path, success, "Dependency observed");
            }
            Observed::Anchored => {
                tracing::trace!(session = %session, path = %path, "Session anchored");
            }
            Observed::Ignored => {}
        }
    }

    /// Record the outcome of a push issued for `entry`.
    pub fn on_push_outcome(
        &self,
        session: SessionId,
        entry: &AssetPath,
        path: &AssetPath,
        outcome: &PushOutcome,
    ) {
        metrics::record_push(outcome.label());
        match outcome {
            PushOutcome::Delivered => self.inner.learner.record_delivery(entry, path),
            PushOutcome::Abandoned => {}
            PushOutcome::Refused => {
                tracing::debug!(session = %session, path = %path, "Client refused push");
            }
            PushOutcome::NotFound | PushOutcome::Failed(_) => {
                tracing::debug!(
                    session = %session,
                    entry = %entry,
                    path = %path,
                    outcome = outcome.label(),
                    "Push failed, weakening dependency"
                );
                self.inner.learner.record_outcome(entry, path, false);
            }
        }
    }
}
