//! Client cache-state token.
//!
//! # Data Flow
//! ```text
//! cookie value (client-held, opaque)
//!     → codec.rs decode (never fails; corrupt ⇒ empty + reset)
//!     → CacheState (assets the client is believed to hold)
//!     → push engine adds the new push set as one generation
//!     → codec.rs encode (deterministic, size-bounded, lossy beyond bound)
//!     → cookie value on the response
//! ```
//!
//! # Design Decisions
//! - The token is the only state that survives reconnects
//! - Explicit version prefix; unknown versions decode to empty state
//! - Lossy: oldest generations are dropped to fit the size bound

pub mod codec;

pub use codec::{CacheState, Decoded, TokenCodec, TOKEN_VERSION};
