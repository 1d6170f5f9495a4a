//! Header manipulation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers on both proxy legs
//! - Name the forwarding and SSE headers the relay sets
//!
//! # Design Decisions
//! - `HeaderName` is always lowercase, so the hop-by-hop check is a plain
//!   comparison and stays case-insensitive with respect to the wire
//! - Multi-valued headers keep every value in original order

use axum::http::header::{self, HeaderMap, HeaderName};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_API_KEY: &str = "x-api-key";

/// Headers scoped to a single connection.
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Append every end-to-end header of `src` onto `dst`. `src` is untouched.
pub fn filtered_copy(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src {
        if is_hop_by_hop(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Copy inbound request headers for the upstream request.
///
/// `Connection` is excluded by name even though the hop-by-hop set already
/// covers it; `Host` is left out because the relay always sets its own.
pub fn copy_request_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src {
        if name == header::CONNECTION || name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Whether a header value should be hidden in debug logs.
pub fn is_sensitive(name: &HeaderName) -> bool {
    name == header::AUTHORIZATION || name.as_str() == X_API_KEY
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn drops_every_hop_by_hop_header_in_any_case() {
        let src = header_map(&[
            ("Connection", "close"),
            ("KEEP-ALIVE", "timeout=5"),
            ("Proxy-Authenticate", "Basic"),
            ("proxy-authorization", "Basic abc"),
            ("TE", "trailers"),
            ("Trailer", "Expires"),
            ("Transfer-Encoding", "chunked"),
            ("Upgrade", "websocket"),
            ("Content-Type", "application/json"),
        ]);
        let mut dst = HeaderMap::new();
        filtered_copy(&mut dst, &src);

        assert_eq!(dst.len(), 1);
        assert_eq!(dst.get(header::CONTENT_TYPE).unwrap(), "application/json");
        for name in HOP_BY_HOP {
            assert!(!dst.contains_key(name), "{name} leaked");
        }
    }

    #[test]
    fn keeps_all_values_in_order() {
        let src = header_map(&[
            ("set-cookie", "a=1"),
            ("x-other", "x"),
            ("set-cookie", "b=2"),
            ("set-cookie", "c=3"),
        ]);
        let mut dst = HeaderMap::new();
        filtered_copy(&mut dst, &src);

        let cookies: Vec<_> = dst
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, ["a=1", "b=2", "c=3"]);
        assert_eq!(src.len(), 4);
    }

    #[test]
    fn appends_rather_than_replaces() {
        let mut dst = header_map(&[("vary", "Origin")]);
        let src = header_map(&[("vary", "Accept")]);
        filtered_copy(&mut dst, &src);
        assert_eq!(dst.get_all(header::VARY).iter().count(), 2);
    }

    #[test]
    fn request_copy_skips_host() {
        let src = header_map(&[
            ("host", "localhost:8080"),
            ("connection", "keep-alive"),
            ("authorization", "Bearer sk"),
        ]);
        let mut dst = HeaderMap::new();
        copy_request_headers(&mut dst, &src);
        assert!(!dst.contains_key(header::HOST));
        assert!(!dst.contains_key(header::CONNECTION));
        assert_eq!(dst.get(header::AUTHORIZATION).unwrap(), "Bearer sk");
    }

    #[test]
    fn sensitive_headers() {
        assert!(is_sensitive(&header::AUTHORIZATION));
        assert!(is_sensitive(&HeaderName::from_static("x-api-key")));
        assert!(!is_sensitive(&header::CONTENT_TYPE));
    }
}
