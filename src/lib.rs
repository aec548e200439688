//! Adaptive HTTP/2 push-cache engine.
//!
//! Learns which assets follow which entry pages, pushes them on later
//! requests, and keeps a compact client-held token of what each client
//! already has so nothing is pushed twice.

// Core engine
pub mod asset;
pub mod learner;
pub mod push;
pub mod session;
pub mod token;

// Transport and operations
pub mod admin;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AutoPushConfig;
pub use http::StaticServer;
pub use lifecycle::Shutdown;
pub use push::PushEngine;
