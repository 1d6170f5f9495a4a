//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay engine, server, config loader
//!     → logging.rs (structured log events, one span per relay)
//!     → metrics.rs (counters and histograms per target)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every relay runs inside a span carrying its request ID
//! - Metrics are recorded through the `metrics` facade; without an
//!   installed exporter the calls are no-ops

pub mod logging;
pub mod metrics;
