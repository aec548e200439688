//! Admin API.
//!
//! # Endpoints
//! - `GET /admin/status`: version, push switch, learner and session counts
//! - `GET /admin/dependencies`: learned edges per entry path
//! - `GET /admin/sessions`: live session count
//! - `POST /admin/dependencies/reset`: forget everything learned
//!
//! All endpoints require `Authorization: Bearer <admin.api_key>`.

pub mod handlers;
pub mod auth;

use axum::{
    routing::{get, post},
    Router,
    middleware,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use crate::config::AdminConfig;
use crate::push::PushEngine;
use self::handlers::*;
use self::auth::admin_auth_middleware;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub engine: PushEngine,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(engine: PushEngine, config: &AdminConfig) -> Self {
        Self {
            engine,
            api_key: Arc::from(config.api_key.as_str()),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/dependencies", get(get_dependencies))
        .route("/admin/dependencies/reset", post(reset_dependencies))
        .route("/admin/sessions", get(get_sessions))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
