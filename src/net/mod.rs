//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listen address
//!     → listener.rs (bind, non-blocking std listener)
//!     → tls.rs (optional certificate loading)
//!     → Hand off to http::server
//! ```

pub mod listener;
pub mod tls;

pub use listener::{bind, ListenerError};
pub use tls::{load_tls_config, TlsError};
