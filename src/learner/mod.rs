//! Dependency learning subsystem.
//!
//! # Data Flow
//! ```text
//! Response completes in a session with a live anchor
//!     → graph.rs record_outcome(anchor, path, success)
//!     → record.rs confirm / penalize one edge
//!
//! Request arrives for an entry path
//!     → graph.rs suggested_push_set(entry)
//!     → record.rs ranked(threshold, fan-out)
//! ```
//!
//! # Design Decisions
//! - Edges live in a per-entry arena, no back references
//! - Failures weaken, never reinforce; zero confidence evicts
//! - Both edges per entry and entries overall are capped

pub mod graph;
pub mod record;

pub use graph::{DependencyLearner, LearnerLimits};
pub use record::{DependencyRecord, Edge, EdgeSnapshot, EntrySnapshot, Penalty};
