//! Session push tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Transport accepts a connection
//!     → id.rs SessionGuard (new SessionId)
//!     → tracker.rs state created on first mark
//!
//! Per request:
//!     → tracker.rs should_push / mark_pushed (decision)
//!     → tracker.rs mark_requested / observe (after response)
//!
//! Teardown:
//!     SessionGuard dropped → tracker.rs close
//!     or no close signal → reaper.rs reap_idle after inactivity
//! ```
//!
//! # Design Decisions
//! - Keyed by transport session, never by the client's cache token
//! - Memory bounded under churn by the inactivity reaper

pub mod id;
pub mod reaper;
pub mod tracker;

pub use id::{SessionGuard, SessionId};
pub use reaper::SessionReaper;
pub use tracker::{Anchor, Observed, SessionTracker};
