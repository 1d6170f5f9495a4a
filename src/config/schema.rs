//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits so the same shape can be read from a TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listen address (e.g., "0.0.0.0:8080" or ":8080").
    pub listen_addr: String,

    /// Upper bound for a single relay, from request entry to the last body byte.
    #[serde(with = "duration::serde_str")]
    pub request_timeout: Duration,

    /// Time allowed for a client to send its request headers.
    #[serde(with = "duration::serde_str")]
    pub read_header_timeout: Duration,

    /// Verbose request logging. Buffers request bodies in memory.
    pub debug: bool,

    /// Skip injecting X-Forwarded-For / X-Forwarded-Proto.
    pub disable_forwarded_headers: bool,

    /// Path prefix to upstream host mappings.
    pub targets: ProxyTargetTable,

    /// Optional TLS termination for the inbound listener.
    pub tls: Option<TlsConfig>,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: ":8080".to_string(),
            request_timeout: Duration::from_secs(60),
            read_header_timeout: Duration::from_secs(10),
            debug: false,
            disable_forwarded_headers: false,
            targets: ProxyTargetTable::defaults(),
            tls: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A single path prefix to upstream host mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyTarget {
    /// Path prefix, always ending in `/`.
    pub path_prefix: String,

    /// Bare upstream hostname, no scheme.
    pub target_host: String,
}

impl ProxyTarget {
    /// Create a target, normalizing the prefix to end with `/`.
    pub fn new(path_prefix: impl Into<String>, target_host: impl Into<String>) -> Self {
        let mut path_prefix = path_prefix.into();
        if !path_prefix.ends_with('/') {
            path_prefix.push('/');
        }
        Self {
            path_prefix,
            target_host: target_host.into(),
        }
    }
}

/// Ordered collection of targets, unique by path prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProxyTargetTable {
    targets: Vec<ProxyTarget>,
}

/// Outcome of inserting into a [`ProxyTargetTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Replaced,
}

impl ProxyTargetTable {
    /// The built-in targets.
    pub fn defaults() -> Self {
        let mut table = Self::default();
        table.upsert(ProxyTarget::new("/openai/", "api.openai.com"));
        table.upsert(ProxyTarget::new("/anthropic/", "api.anthropic.com"));
        table.upsert(ProxyTarget::new("/gemini/", "generativelanguage.googleapis.com"));
        table
    }

    /// Insert a target. An existing entry with the same prefix keeps its
    /// position and takes the new host.
    pub fn upsert(&mut self, target: ProxyTarget) -> Upsert {
        match self
            .targets
            .iter_mut()
            .find(|t| t.path_prefix == target.path_prefix)
        {
            Some(existing) => {
                existing.target_host = target.target_host;
                Upsert::Replaced
            }
            None => {
                self.targets.push(target);
                Upsert::Added
            }
        }
    }

    /// Look up a target by its exact prefix.
    pub fn get(&self, path_prefix: &str) -> Option<&ProxyTarget> {
        self.targets.iter().find(|t| t.path_prefix == path_prefix)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProxyTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProxyTargetTable {
    type Item = &'a ProxyTarget;
    type IntoIter = std::slice::Iter<'a, ProxyTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

impl FromIterator<ProxyTarget> for ProxyTargetTable {
    fn from_iter<I: IntoIterator<Item = ProxyTarget>>(iter: I) -> Self {
        let mut table = Self::default();
        for target in iter {
            table.upsert(target);
        }
        table
    }
}

// Entries in a config file go through `ProxyTarget::new` so prefixes are
// normalized and duplicates collapse the same way CLI and env entries do.
impl<'de> Deserialize<'de> for ProxyTargetTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<ProxyTarget>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|t| ProxyTarget::new(t.path_prefix, t.target_host))
            .collect())
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus scrape endpoint bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}
