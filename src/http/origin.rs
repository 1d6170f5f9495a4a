//! Client origin for forwarding headers.
//!
//! An existing `X-Forwarded-For` is trusted and its leftmost entry wins;
//! otherwise the peer address of the connection is used.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::http::headers::{X_FORWARDED_FOR, X_FORWARDED_PROTO};

/// Connection facts the extractor needs besides headers.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    /// Raw peer address, usually `ip:port`.
    pub remote_addr: String,
    /// Whether the inbound connection was TLS-terminated here.
    pub tls: bool,
}

impl PeerInfo {
    pub fn new(remote_addr: impl Into<String>, tls: bool) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            tls,
        }
    }

    pub fn from_socket(addr: SocketAddr, tls: bool) -> Self {
        Self::new(addr.to_string(), tls)
    }
}

/// Originating client IP.
pub fn client_ip(headers: &HeaderMap, peer: &PeerInfo) -> String {
    if let Some(xff) = header_str(headers, &X_FORWARDED_FOR) {
        if let Some(first) = xff.split(',').next() {
            return first.trim().to_string();
        }
    }

    match peer.remote_addr.parse::<SocketAddr>() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => peer.remote_addr.clone(),
    }
}

/// Originating scheme.
pub fn scheme(headers: &HeaderMap, peer: &PeerInfo) -> String {
    if let Some(proto) = header_str(headers, &X_FORWARDED_PROTO) {
        return proto.to_string();
    }
    let scheme = if peer.tls { "https" } else { "http" };
    scheme.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &axum::http::HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}
