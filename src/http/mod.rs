//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server setup, header-read timeout)
//!     → [routing layer binds the request to its target]
//!     → relay.rs (build upstream request, execute, relay body)
//!         headers.rs  hop-by-hop filtering, both legs
//!         origin.rs   X-Forwarded-For / X-Forwarded-Proto values
//!         sink.rs     chunked, flushable client body
//!         error.rs    504 / 500 responses
//!     → Send to client
//! ```

pub mod error;
pub mod headers;
pub mod origin;
pub mod relay;
pub mod server;
pub mod sink;

pub use error::RelayError;
pub use relay::{RelayEngine, RelaySettings};
pub use server::{HttpServer, ServerError};
