//! Path-prefix reverse proxy for hosted AI APIs.
//!
//! Each configured prefix (`/openai/`, `/anthropic/`, ...) is bound to one
//! upstream host. Requests are relayed over https with hop-by-hop headers
//! stripped and forwarding headers added; event-stream responses are flushed
//! to the client chunk by chunk.

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use cli::Cli;
pub use config::ProxyConfig;
pub use http::{HttpServer, RelayEngine};
pub use lifecycle::Shutdown;
