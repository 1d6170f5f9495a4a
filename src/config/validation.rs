//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0)
//! - Detect conflicting or overlapping target prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::HEALTH_PATH;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no proxy targets configured")]
    NoTargets,
    #[error("path prefix {0:?} must start with '/'")]
    PrefixNotAbsolute(String),
    #[error("path prefix {0:?} would capture every request")]
    PrefixIsRoot(String),
    #[error("path prefix {0:?} contains route syntax characters")]
    PrefixSyntax(String),
    #[error("path prefix {0:?} collides with the health endpoint")]
    PrefixShadowsHealth(String),
    #[error("path prefixes {0:?} and {1:?} overlap")]
    OverlappingPrefixes(String, String),
    #[error("target host for {0:?} is empty")]
    EmptyHost(String),
    #[error("target host {host:?} for {prefix:?} must be a bare hostname")]
    HostNotBare { prefix: String, host: String },
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("listen address is empty")]
    EmptyListenAddr,
    #[error("TLS requires both a certificate and a key")]
    IncompleteTls,
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen_addr.trim().is_empty() {
        errors.push(ValidationError::EmptyListenAddr);
    }
    if config.request_timeout.is_zero() {
        errors.push(ValidationError::ZeroTimeout("request timeout"));
    }
    if config.read_header_timeout.is_zero() {
        errors.push(ValidationError::ZeroTimeout("header read timeout"));
    }
    if let Some(tls) = &config.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }

    if config.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    }

    for target in &config.targets {
        let prefix = &target.path_prefix;
        if !prefix.starts_with('/') {
            errors.push(ValidationError::PrefixNotAbsolute(prefix.clone()));
        } else if prefix == "/" {
            errors.push(ValidationError::PrefixIsRoot(prefix.clone()));
        }
        if prefix.contains(['{', '}', '*', '?', '#']) {
            errors.push(ValidationError::PrefixSyntax(prefix.clone()));
        }
        if prefix.trim_end_matches('/') == HEALTH_PATH {
            errors.push(ValidationError::PrefixShadowsHealth(prefix.clone()));
        }

        let host = target.target_host.trim();
        if host.is_empty() {
            errors.push(ValidationError::EmptyHost(prefix.clone()));
        } else if host.contains("://") || host.contains(['/', '?', '#', '@']) || host.contains(char::is_whitespace) {
            errors.push(ValidationError::HostNotBare {
                prefix: prefix.clone(),
                host: target.target_host.clone(),
            });
        }
    }

    let targets: Vec<_> = config.targets.iter().collect();
    for (i, a) in targets.iter().enumerate() {
        for b in &targets[i + 1..] {
            if a.path_prefix.starts_with(&b.path_prefix) || b.path_prefix.starts_with(&a.path_prefix) {
                errors.push(ValidationError::OverlappingPrefixes(
                    a.path_prefix.clone(),
                    b.path_prefix.clone(),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::schema::{ProxyTarget, TlsConfig};

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_problem() {
        let mut config = ProxyConfig::default();
        config.request_timeout = Duration::ZERO;
        config.targets.upsert(ProxyTarget::new("/openai/v2/", "api.openai.com"));
        config.targets.upsert(ProxyTarget::new("/bad/", "https://example.com"));
        config.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: String::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroTimeout("request timeout")));
        assert!(errors.contains(&ValidationError::OverlappingPrefixes(
            "/openai/".into(),
            "/openai/v2/".into()
        )));
        assert!(errors.contains(&ValidationError::HostNotBare {
            prefix: "/bad/".into(),
            host: "https://example.com".into(),
        }));
        assert!(errors.contains(&ValidationError::IncompleteTls));
    }

    #[test]
    fn rejects_prefixes_that_break_routing() {
        let mut config = ProxyConfig::default();
        config.targets.upsert(ProxyTarget::new("/", "example.com"));
        config.targets.upsert(ProxyTarget::new("/health", "example.com"));
        config.targets.upsert(ProxyTarget::new("/{id}/", "example.com"));
        config.targets.upsert(ProxyTarget::new("relative/", "example.com"));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::PrefixIsRoot("/".into())));
        assert!(errors.contains(&ValidationError::PrefixShadowsHealth("/health/".into())));
        assert!(errors.contains(&ValidationError::PrefixSyntax("/{id}/".into())));
        assert!(errors.contains(&ValidationError::PrefixNotAbsolute("relative/".into())));
    }

    #[test]
    fn host_with_port_is_bare() {
        let mut config = ProxyConfig::default();
        config.targets.upsert(ProxyTarget::new("/local/", "localhost:8443"));
        assert_eq!(validate_config(&config), Ok(()));
    }
}
