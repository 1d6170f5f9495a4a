//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → CLI flags, --targets list
//!     → PROXY_TARGET_* environment variables
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to the server and relay engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no runtime mutation
//! - Targets merge by prefix, last writer wins
//! - Validation separates syntactic (serde, clap) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{LogFormat, ObservabilityConfig, ProxyConfig, ProxyTarget, ProxyTargetTable, TlsConfig};
