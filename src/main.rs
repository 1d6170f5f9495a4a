//! api-relay
//!
//! ```text
//!     Client Request
//!     ───────────────▶ axum-server ──▶ prefix route ──▶ RelayEngine ──▶ https upstream
//!                       (TLS opt.)     TargetHandler     │
//!     Client Response                                    │
//!     ◀─────────────── ChannelSink ◀── body pump ◀───────┘
//! ```

use std::net::SocketAddr;

use clap::Parser;

use api_relay::config::loader;
use api_relay::lifecycle::{wait_for_shutdown_signal, Shutdown};
use api_relay::observability::{logging, metrics};
use api_relay::{net, Cli, HttpServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The file may choose the log format, so it is read before logging starts.
    let base = loader::base_config(&cli)?;
    let log_format = cli.log_format.unwrap_or(base.observability.log_format);
    logging::init_logging(log_format, cli.debug || base.debug)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-relay starting");

    let config = match loader::apply_overrides(base, &cli, std::env::vars()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    loader::log_config(&config);

    if let Some(addr) = &config.observability.metrics_address {
        let addr: SocketAddr = loader::normalize_listen_addr(addr).parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = net::bind(&config.listen_addr)?;
    let server = HttpServer::new(config);

    // The coordinator lives here: dropping it would stop the server too.
    let shutdown = Shutdown::new();
    let serve = server.run(listener, shutdown.subscribe());
    tokio::pin!(serve);

    let result = tokio::select! {
        result = &mut serve => result,
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(signal) => {
                    tracing::info!(signal, "Shutdown signal received");
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signals"),
            }
            serve.await
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Server failed");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
