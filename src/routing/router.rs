//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Bind every configured prefix to its own [`TargetHandler`]
//! - Serve the liveness endpoint
//! - Redirect a prefix missing its trailing slash to the prefix
//! - Answer everything else with 404
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - The handler owns its target; nothing is looked up per request

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};

use crate::config::{ProxyTarget, ProxyTargetTable};
use crate::http::origin::PeerInfo;
use crate::http::relay::RelayEngine;
use crate::routing::HEALTH_PATH;

/// Request handler bound to a single target.
#[derive(Debug, Clone)]
pub struct TargetHandler {
    target: Arc<ProxyTarget>,
    engine: Arc<RelayEngine>,
    tls: bool,
}

impl TargetHandler {
    pub fn new(target: ProxyTarget, engine: Arc<RelayEngine>, tls: bool) -> Self {
        Self {
            target: Arc::new(target),
            engine,
            tls,
        }
    }

    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    /// Relay `request` to this handler's target.
    pub async fn handle(self, request: Request<Body>) -> Response {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| PeerInfo::from_socket(*addr, self.tls))
            .unwrap_or_else(|| PeerInfo::new("", self.tls));
        self.engine.relay(self.target.clone(), peer, request).await
    }
}

/// Build the dispatcher for `targets`.
pub fn build_routes(targets: &ProxyTargetTable, engine: Arc<RelayEngine>, tls: bool) -> Router {
    let mut router = Router::new().route(HEALTH_PATH, get(health));

    for target in targets {
        let handler = TargetHandler::new(target.clone(), engine.clone(), tls);
        let prefix = handler.target().path_prefix.clone();
        let nested = format!("{prefix}{{*rest}}");

        // The catch-all segment never matches an empty remainder, so the bare
        // prefix needs its own route.
        let bare = handler.clone();
        router = router
            .route(&prefix, any(move |request: Request<Body>| bare.clone().handle(request)))
            .route(&nested, any(move |request: Request<Body>| handler.clone().handle(request)));

        let trimmed = prefix.trim_end_matches('/');
        if !trimmed.is_empty() && trimmed != HEALTH_PATH {
            let location = prefix.clone();
            router = router.route(trimmed, any(move |uri: Uri| redirect_to(location.clone(), uri)));
        }

        tracing::info!(prefix = %prefix, target = %target.target_host, "Registered handler");
    }

    router.fallback(not_found)
}

async fn health() -> &'static str {
    "OK"
}

/// 301 to `location`, keeping the query string.
async fn redirect_to(mut location: String, uri: Uri) -> Response {
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    match HeaderValue::try_from(location) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}
