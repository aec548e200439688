//! Asset key space.
//!
//! # Data Flow
//! ```text
//! raw request path ("/static/app/../x.js?v=3")
//!     → path.rs (strip query, decode, reject traversal, strip prefix)
//!     → AssetPath ("/x.js" style canonical key)
//!     → used by token, learner, session and push subsystems
//! ```
//!
//! # Design Decisions
//! - One canonical form everywhere; no subsystem re-normalizes
//! - Prefix mismatch is reported, never silently accepted

pub mod path;

pub use path::{AssetPath, PathError, PathNormalizer};
