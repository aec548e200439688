use axum::{
    extract::State,
    Json,
};
use serde::Serialize;
use crate::admin::AdminState;
use crate::learner::EntrySnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub push_enabled: bool,
    pub learned_entries: usize,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct SessionSummary {
    pub active_sessions: usize,
}

#[derive(Serialize)]
pub struct ResetSummary {
    pub cleared_entries: usize,
}

pub async fn get_status(
    State(state): State<AdminState>,
) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        push_enabled: state.engine.settings().enabled,
        learned_entries: state.engine.learner().entry_count(),
        active_sessions: state.engine.tracker().len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Everything the learner currently knows, per entry path.
pub async fn get_dependencies(
    State(state): State<AdminState>,
) -> Json<Vec<EntrySnapshot>> {
    Json(state.engine.learner().snapshot())
}

pub async fn get_sessions(
    State(state): State<AdminState>,
) -> Json<SessionSummary> {
    Json(SessionSummary {
        active_sessions: state.engine.tracker().len(),
    })
}

pub async fn reset_dependencies(
    State(state): State<AdminState>,
) -> Json<ResetSummary> {
    let learner = state.engine.learner();
    let cleared_entries = learner.entry_count();
    learner.clear();
    tracing::info!(cleared_entries, "Learned dependencies reset via admin API");
    Json(ResetSummary { cleared_entries })
}
