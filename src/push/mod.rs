//! Push decision and issuance subsystem.
//!
//! # Data Flow
//! ```text
//! Transport receives a primary request
//!     → engine.rs on_request
//!         → asset::PathNormalizer (Normalize)
//!         → token::TokenCodec + learner + session tracker (Decide)
//!         → new token, mark_pushed (Commit)
//!     → executor.rs promises in ranked order, delivers in the background
//!         → engine.rs on_push_outcome per push
//!
//! Transport finishes the primary response
//!     → engine.rs on_response → tracker observe → learner record_outcome
//! ```
//!
//! # Design Decisions
//! - Two explicit calls around the primary response, no middleware
//! - The transport is abstracted by `PushStream`, so the engine is testable
//!   without a network

pub mod engine;
pub mod executor;
pub mod types;

pub use engine::{EngineSettings, PushEngine, RequestOutcome};
pub use executor::{execute, PromisedPush, PushHandle, PushReport, PushStream};
pub use types::{
    PushDecision, PushError, PushJob, PushOutcome, RequestContext, ResponseStatus,
};
