//! Target resolution.
//!
//! # Responsibilities
//! - Strip the registered prefix from the inbound path
//! - Build the upstream URL for the bound target
//!
//! Resolution cannot fail: a handler is only ever invoked for paths under
//! its own prefix.

use axum::http::uri::{InvalidUri, Uri};

use crate::config::ProxyTarget;

/// Where a request under a target's prefix goes upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Path after the prefix, always starting with `/`.
    pub suffix_path: String,
    /// Upstream host from the target.
    pub host: &'a str,
}

/// Resolve `path` against the target it was dispatched to.
pub fn resolve<'a>(target: &'a ProxyTarget, path: &str) -> Resolution<'a> {
    Resolution {
        suffix_path: strip_prefix(&target.path_prefix, path),
        host: &target.target_host,
    }
}

/// Remove `prefix` from `path`. An empty remainder maps to the root path.
pub fn strip_prefix(prefix: &str, path: &str) -> String {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    }
}

impl Resolution<'_> {
    /// `{scheme}://{host}{suffix}` with the query string carried verbatim.
    ///
    /// The bytes are not re-encoded: whatever the client sent after `?`
    /// reaches upstream unchanged.
    pub fn upstream_url(&self, scheme: &str, query: Option<&str>) -> Result<Uri, InvalidUri> {
        let mut raw = format!("{scheme}://{}{}", self.host, self.suffix_path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            raw.push('?');
            raw.push_str(query);
        }
        Uri::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_keeps_leading_slash() {
        assert_eq!(strip_prefix("/openai/", "/openai/v1/chat/completions"), "/v1/chat/completions");
        assert_eq!(strip_prefix("/openai/", "/openai/"), "/");
        assert_eq!(strip_prefix("/openai/", "/elsewhere"), "/elsewhere");
    }

    #[test]
    fn builds_https_url_with_query() {
        let target = ProxyTarget::new("/foo/", "example.com");
        let resolution = resolve(&target, "/foo/bar");
        let url = resolution.upstream_url("https", Some("x=1")).unwrap();
        assert_eq!(url.to_string(), "https://example.com/bar?x=1");
    }

    #[test]
    fn empty_suffix_targets_root() {
        let target = ProxyTarget::new("/gemini/", "generativelanguage.googleapis.com");
        let url = resolve(&target, "/gemini/").upstream_url("https", None).unwrap();
        assert_eq!(url.to_string(), "https://generativelanguage.googleapis.com/");
    }

    #[test]
    fn query_is_verbatim() {
        let target = ProxyTarget::new("/foo/", "example.com");
        let url = resolve(&target, "/foo/models/gemini-pro:streamGenerateContent")
            .upstream_url("https", Some("alt=sse&key=a%2Fb"))
            .unwrap();
        assert_eq!(
            url.to_string(),
            "https://example.com/models/gemini-pro:streamGenerateContent?alt=sse&key=a%2Fb"
        );
        assert_eq!(url.query(), Some("alt=sse&key=a%2Fb"));
    }

    #[test]
    fn query_quotes_are_not_reencoded() {
        let target = ProxyTarget::new("/foo/", "example.com");
        let url = resolve(&target, "/foo/search")
            .upstream_url("https", Some("q=it's&r=\"x\""))
            .unwrap();
        assert_eq!(url.query(), Some("q=it's&r=\"x\""));
        assert_eq!(url.host(), Some("example.com"));
        assert_eq!(url.path(), "/search");
    }

    #[test]
    fn empty_query_adds_no_question_mark() {
        let target = ProxyTarget::new("/foo/", "example.com");
        let url = resolve(&target, "/foo/bar").upstream_url("https", Some("")).unwrap();
        assert_eq!(url.to_string(), "https://example.com/bar");
    }

    #[test]
    fn bad_host_fails_to_build() {
        let target = ProxyTarget::new("/foo/", "exa mple.com");
        assert!(resolve(&target, "/foo/bar").upstream_url("https", None).is_err());
    }
}
