//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::duration::parse_duration;
use crate::config::schema::LogFormat;

/// Path-prefix reverse proxy for hosted AI APIs.
///
/// Targets can also be supplied through `PROXY_TARGET_<NAME>=/prefix/:host`
/// environment variables, which are applied after `--targets`.
#[derive(Debug, Default, Parser)]
#[command(name = "api-relay", version)]
pub struct Cli {
    /// Optional TOML config file providing base settings.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listen address.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Request timeout (e.g. 60s, 2m).
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub timeout: Option<Duration>,

    /// Read header timeout.
    #[arg(long = "header-timeout", value_parser = parse_duration, value_name = "DURATION")]
    pub header_timeout: Option<Duration>,

    /// Enable debug logging (buffers request bodies).
    #[arg(long)]
    pub debug: bool,

    /// Custom proxy targets in format: /path1/:host1,/path2/:host2
    #[arg(long, value_name = "LIST")]
    pub targets: Option<String>,

    /// Do not add X-Forwarded-For / X-Forwarded-Proto to upstream requests.
    #[arg(long)]
    pub disable_forwarded_headers: bool,

    /// TLS certificate (PEM) for the listener.
    #[arg(long, value_name = "PATH", requires = "tls_key")]
    pub tls_cert: Option<String>,

    /// TLS private key (PEM) for the listener.
    #[arg(long, value_name = "PATH", requires = "tls_cert")]
    pub tls_key: Option<String>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_address: Option<String>,

    /// Log output format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}
