//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → Hand off to the HTTP/2 layer with its ConnectionPermit
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - The permit lives as long as the connection task, even on panic

pub mod listener;

pub use listener::{ConnectionPermit, Listener, ListenerError};
