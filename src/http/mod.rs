//! HTTP/2 transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → http1.rs (no HTTP/2 preface: plain HTTP/1.1 file serving, stop)
//!     → server.rs (h2 handshake, one push session per connection)
//!     → request.rs (request ID, origin)
//!     → cookie.rs (read cache token)
//!     → push::PushEngine::on_request
//!         → push_stream.rs (PUSH_PROMISE, pushed bodies via files.rs)
//!     → files.rs (primary body), cookie.rs (set-cookie)
//!     → push::PushEngine::on_response
//! ```
//!
//! # Design Decisions
//! - Cleartext HTTP/2 with prior knowledge; TLS termination is out of scope
//! - HTTP/1.1 clients still get files, just never pushes or tokens
//! - The engine only ever sees the `PushStream` abstraction

pub mod cookie;
pub mod files;
mod http1;
pub mod push_stream;
pub mod request;
pub mod server;

pub use files::{Asset, FileError, StaticFiles};
pub use push_stream::{H2PromisedPush, H2PushStream};
pub use request::{Origin, RequestId, X_REQUEST_ID};
pub use server::{ServerError, StaticServer};
