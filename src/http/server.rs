//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router from the target table
//! - Apply the header-read timeout to inbound HTTP/1 connections
//! - Serve plain HTTP or TLS from the same code path
//! - Drain in-flight relays on shutdown

use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::{Handle, Server};
use hyper_util::rt::TokioTimer;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::relay::{RelayEngine, RelaySettings};
use crate::lifecycle::ShutdownSignal;
use crate::net::{load_tls_config, TlsError};
use crate::routing;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    pub fn new(config: ProxyConfig) -> Self {
        let engine = RelayEngine::new(RelaySettings::from(&config));
        Self::with_engine(config, engine)
    }

    /// Build a server around an existing engine.
    pub fn with_engine(config: ProxyConfig, engine: RelayEngine) -> Self {
        let router = Self::build_router(&config, Arc::new(engine));
        Self { router, config }
    }

    fn build_router(config: &ProxyConfig, engine: Arc<RelayEngine>) -> Router {
        routing::build_routes(&config.targets, engine, config.tls.is_some()).layer(TraceLayer::new_for_http())
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain for the
    /// signal's grace window and stop.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;

        let handle = Handle::new();
        tokio::spawn(shutdown.drain(handle.clone()));

        let header_timeout = self.config.read_header_timeout;
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        match &self.config.tls {
            Some(tls) => {
                let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                tracing::info!(address = %addr, "Starting proxy server with TLS");
                let server = axum_server::from_tcp_rustls(listener, rustls).handle(handle);
                with_header_timeout(server, header_timeout).serve(app).await?;
            }
            None => {
                tracing::info!(address = %addr, "Starting proxy server");
                let server = axum_server::from_tcp(listener).handle(handle);
                with_header_timeout(server, header_timeout).serve(app).await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn with_header_timeout<A>(mut server: Server<A>, timeout: Duration) -> Server<A> {
    server
        .http_builder()
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(timeout);
    server
}
