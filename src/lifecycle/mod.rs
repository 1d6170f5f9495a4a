//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_shutdown_signal resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger → ShutdownSignal::drain → server stops accepting
//!     → in-flight relays drain → forced close after the grace window
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal, SHUTDOWN_GRACE};
pub use signals::wait_for_shutdown_signal;
