//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     ProxyTargetTable
//!     → router.rs (one TargetHandler per target, bound to `{prefix}` and
//!       `{prefix}{*rest}`)
//!     → Freeze as immutable axum Router
//!
//! Incoming Request (path)
//!     → axum dispatch to the handler registered for the prefix
//!     → resolver.rs (strip prefix, build upstream URL)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No runtime prefix search: each prefix owns a dedicated handler, so
//!   overlapping prefixes are rejected during validation instead
//! - Unknown paths get a plain 404

pub mod resolver;
pub mod router;

/// Liveness endpoint path. No target prefix may claim it.
pub const HEALTH_PATH: &str = "/health";

pub use resolver::{resolve, Resolution};
pub use router::{build_routes, TargetHandler};
