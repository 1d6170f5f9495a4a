//! Configuration loading and merging.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, CLI flags,
//! then `PROXY_TARGET_*` environment variables. Targets merge by prefix.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::cli::Cli;
use crate::config::duration::format_duration;
use crate::config::schema::{ObservabilityConfig, ProxyConfig, ProxyTarget, ProxyTargetTable, TlsConfig, Upsert};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable prefix for target definitions.
pub const ENV_TARGET_PREFIX: &str = "PROXY_TARGET_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where a target definition came from, for logging.
#[derive(Debug, Clone, Copy)]
enum Source {
    CommandLine,
    Environment,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::CommandLine => f.write_str("command line"),
            Source::Environment => f.write_str("environment"),
        }
    }
}

/// Parse `/prefix/:host`. The split happens at the first `:` so hosts may
/// carry a port.
pub fn parse_target_definition(definition: &str) -> Option<ProxyTarget> {
    let (prefix, host) = definition.trim().split_once(':')?;
    Some(ProxyTarget::new(prefix, host))
}

/// Apply a comma-separated list of target definitions.
pub fn apply_target_list(table: &mut ProxyTargetTable, list: &str) {
    for definition in list.split(',') {
        apply_definition(table, definition, Source::CommandLine);
    }
}

/// Apply every `PROXY_TARGET_*` variable from `vars`.
pub fn apply_env_targets<I, K, V>(table: &mut ProxyTargetTable, vars: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in vars {
        if key.as_ref().starts_with(ENV_TARGET_PREFIX) {
            apply_definition(table, value.as_ref(), Source::Environment);
        }
    }
}

fn apply_definition(table: &mut ProxyTargetTable, definition: &str, source: Source) {
    let Some(target) = parse_target_definition(definition) else {
        tracing::warn!(definition, %source, "Invalid proxy target definition");
        return;
    };
    let prefix = target.path_prefix.clone();
    let host = target.target_host.clone();
    match table.upsert(target) {
        Upsert::Replaced => tracing::info!(prefix = %prefix, host = %host, %source, "Overriding proxy target"),
        Upsert::Added => tracing::info!(prefix = %prefix, host = %host, %source, "Added proxy target"),
    }
}

/// Load a TOML file. Targets listed in the file merge into the defaults.
pub fn load_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ProxyConfig = toml::from_str(&content)?;

    let mut targets = ProxyTargetTable::defaults();
    for target in &config.targets {
        targets.upsert(target.clone());
    }
    config.targets = targets;

    Ok(config)
}

/// Expand `:8080` into an address every interface binds to.
pub fn normalize_listen_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

/// Build the final configuration from CLI flags and the process environment.
pub fn load(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    load_with_env(cli, std::env::vars())
}

/// Same as [`load`] with an explicit environment.
pub fn load_with_env<I, K, V>(cli: &Cli, env: I) -> Result<ProxyConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    apply_overrides(base_config(cli)?, cli, env)
}

/// Defaults, or the config file when `--config` is given. Nothing is logged,
/// so this can run before logging is set up.
pub fn base_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    match &cli.config {
        Some(path) => load_config_file(path),
        None => Ok(ProxyConfig::default()),
    }
}

/// Layer CLI flags and `PROXY_TARGET_*` variables over `config`, then
/// validate the result.
pub fn apply_overrides<I, K, V>(mut config: ProxyConfig, cli: &Cli, env: I) -> Result<ProxyConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    if let Some(listen) = &cli.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout = timeout;
    }
    if let Some(timeout) = cli.header_timeout {
        config.read_header_timeout = timeout;
    }
    config.debug |= cli.debug;
    config.disable_forwarded_headers |= cli.disable_forwarded_headers;

    if let (Some(cert_path), Some(key_path)) = (&cli.tls_cert, &cli.tls_key) {
        config.tls = Some(TlsConfig {
            cert_path: cert_path.clone(),
            key_path: key_path.clone(),
        });
    }

    let ObservabilityConfig { log_format, metrics_address } = &mut config.observability;
    if let Some(format) = cli.log_format {
        *log_format = format;
    }
    if let Some(addr) = &cli.metrics_address {
        *metrics_address = Some(addr.clone());
    }

    if let Some(list) = cli.targets.as_deref().filter(|s| !s.is_empty()) {
        apply_target_list(&mut config.targets, list);
    }
    apply_env_targets(&mut config.targets, env);

    config.listen_addr = normalize_listen_addr(&config.listen_addr);

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Log the effective configuration once at startup.
pub fn log_config(config: &ProxyConfig) {
    tracing::info!(
        listen_addr = %config.listen_addr,
        request_timeout = %format_duration(config.request_timeout),
        read_header_timeout = %format_duration(config.read_header_timeout),
        debug = config.debug,
        forwarded_headers = !config.disable_forwarded_headers,
        tls = config.tls.is_some(),
        "Configuration loaded"
    );
    for target in &config.targets {
        tracing::info!(prefix = %target.path_prefix, host = %target.target_host, "Proxy target");
    }
}
