//! Relay engine: forwards one request upstream and streams the answer back.
//!
//! # State Machine
//! ```text
//! Received → BuildingUpstreamRequest → AwaitingUpstreamResponse → RelayingBody → Complete
//!                     │                          │
//!                     └──────────────────────────┴──→ Failed
//! ```
//!
//! # Design Decisions
//! - One deadline per relay, started when the upstream request is built and
//!   covering the upstream call and every body read after it
//! - The client leg cancels the upstream leg: dropping the handler future
//!   aborts the call, and a closed body sink ends the copy loop
//! - No client-level timeout on the upstream client, so long streams are
//!   bounded only by the deadline
//! - At most one upstream attempt per request; nothing is retried
//! - Event streams are flushed per chunk, everything else is buffered

use std::fmt::Display;
use std::pin::pin;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{ProxyConfig, ProxyTarget};
use crate::http::error::RelayError;
use crate::http::headers::{self, X_FORWARDED_FOR, X_FORWARDED_PROTO};
use crate::http::origin::{self, PeerInfo};
use crate::http::sink::{BodySink, ChannelSink};
use crate::observability::metrics;
use crate::routing::resolver;

/// Size of each body chunk written to the client.
pub const CHUNK_SIZE: usize = 4096;

/// Content type that switches the relay into streaming mode.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Request bodies larger than this are cut short in debug logs.
const DEBUG_BODY_LOG_LIMIT: usize = 4096;

const POOL_MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

static FLUSH_UNSUPPORTED: Once = Once::new();

/// Pooled upstream client. Plain http is allowed so tests can reach local
/// mock servers; production targets are always https.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Per-request lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Received,
    BuildingUpstreamRequest,
    AwaitingUpstreamResponse,
    RelayingBody,
    Complete,
    Failed,
}

/// How the body copy ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream signalled end of body.
    Complete,
    /// Upstream body read failed; the client keeps the partial body.
    UpstreamReadError,
    /// The request deadline passed mid-body.
    DeadlineExceeded,
    /// The client went away.
    ClientGone,
}

/// Summary of a finished body copy.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub outcome: RelayOutcome,
    pub bytes_transferred: u64,
    pub duration: Duration,
}

/// State owned by a single relay from entry until the handler is done.
#[derive(Debug)]
pub struct RelayContext {
    pub request_id: String,
    pub started: Instant,
    pub method: Method,
    pub path: String,
    pub target: Arc<ProxyTarget>,
    pub upstream_url: Option<Uri>,
    pub status: Option<StatusCode>,
    pub bytes_transferred: u64,
    pub is_streaming: bool,
    state: RelayState,
}

impl RelayContext {
    pub fn new(target: Arc<ProxyTarget>, method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            method,
            path: path.into(),
            target,
            upstream_url: None,
            status: None,
            bytes_transferred: 0,
            is_streaming: false,
            state: RelayState::Received,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    fn advance(&mut self, next: RelayState) {
        tracing::trace!(from = ?self.state, to = ?next, "Relay state");
        self.state = next;
    }
}

/// Settings the relay reads from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub request_timeout: Duration,
    pub debug: bool,
    pub forwarded_headers: bool,
}

impl From<&ProxyConfig> for RelaySettings {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            debug: config.debug,
            forwarded_headers: !config.disable_forwarded_headers,
        }
    }
}

/// Forwards requests to upstream hosts over a shared connection pool.
#[derive(Debug, Clone)]
pub struct RelayEngine {
    client: UpstreamClient,
    settings: RelaySettings,
    upstream_scheme: &'static str,
}

impl RelayEngine {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            client: upstream_client(),
            settings,
            upstream_scheme: "https",
        }
    }

    /// Override the upstream scheme. Real upstreams are always reached over
    /// https; plaintext is only useful against local mock servers.
    pub fn with_upstream_scheme(mut self, scheme: &'static str) -> Self {
        self.upstream_scheme = scheme;
        self
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Relay `request` to `target` and return the client response.
    ///
    /// The response is returned as soon as upstream headers arrive; the body
    /// is copied by a background task.
    pub async fn relay(&self, target: Arc<ProxyTarget>, peer: PeerInfo, request: Request<Body>) -> Response<Body> {
        let ctx = RelayContext::new(target, request.method().clone(), request.uri().path());
        let span = tracing::info_span!("relay", request_id = %ctx.request_id);
        self.run(ctx, peer, request).instrument(span).await
    }

    async fn run(&self, mut ctx: RelayContext, peer: PeerInfo, request: Request<Body>) -> Response<Body> {
        match self.forward(&mut ctx, &peer, request).await {
            Ok((upstream, deadline)) => self.respond(ctx, upstream, deadline),
            Err(err) => {
                ctx.advance(RelayState::Failed);
                tracing::error!(error = %err, status = err.status().as_u16(), "Error executing request");
                metrics::record_upstream_error(&ctx.target.path_prefix, err.kind());
                metrics::record_relay(
                    &ctx.target.path_prefix,
                    err.status().as_u16(),
                    0,
                    ctx.started.elapsed(),
                );
                err.into_response()
            }
        }
    }

    async fn forward(
        &self,
        ctx: &mut RelayContext,
        peer: &PeerInfo,
        request: Request<Body>,
    ) -> Result<(Response<Incoming>, Instant), RelayError> {
        let (parts, body) = request.into_parts();

        tracing::info!(
            method = %ctx.method,
            path = %ctx.path,
            target = %ctx.target.target_host,
            "Incoming request"
        );

        // Debug mode holds the whole body in memory so it can be logged.
        // There is no size cap; very large uploads should not be debugged.
        let body = if self.settings.debug {
            log_request_metadata(&parts, peer);
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(RelayError::BodyRead)?;
            log_request_body(&bytes);
            Body::from(bytes)
        } else {
            body
        };

        ctx.advance(RelayState::BuildingUpstreamRequest);
        let resolution = resolver::resolve(&ctx.target, parts.uri.path());
        let url = resolution
            .upstream_url(self.upstream_scheme, parts.uri.query())
            .map_err(|e| RelayError::Build(e.to_string()))?;
        let deadline = Instant::now() + self.settings.request_timeout;

        let mut upstream = Request::new(body);
        *upstream.method_mut() = parts.method.clone();
        *upstream.uri_mut() = url.clone();
        let outbound = upstream.headers_mut();
        headers::copy_request_headers(outbound, &parts.headers);
        if self.settings.forwarded_headers {
            set_forwarding_headers(outbound, &parts.headers, peer);
        }
        let host = HeaderValue::from_str(resolution.host).map_err(|e| RelayError::Build(e.to_string()))?;
        outbound.insert(header::HOST, host);

        ctx.advance(RelayState::AwaitingUpstreamResponse);
        tracing::info!(url = %url, "Sending request upstream");
        ctx.upstream_url = Some(url);

        match timeout_at(deadline, self.client.request(upstream)).await {
            Err(_) => Err(RelayError::Timeout),
            Ok(Err(e)) => Err(RelayError::Upstream(e)),
            Ok(Ok(response)) => Ok((response, deadline)),
        }
    }

    fn respond(&self, mut ctx: RelayContext, upstream: Response<Incoming>, deadline: Instant) -> Response<Body> {
        ctx.advance(RelayState::RelayingBody);
        let (upstream, incoming) = upstream.into_parts();
        let status = upstream.status;
        ctx.status = Some(status);

        if self.settings.debug {
            tracing::debug!(
                status = status.as_u16(),
                content_type = ?upstream.headers.get(header::CONTENT_TYPE),
                content_length = ?upstream.headers.get(header::CONTENT_LENGTH),
                "Received response"
            );
        }

        let mut response_headers = HeaderMap::new();
        headers::filtered_copy(&mut response_headers, &upstream.headers);

        ctx.is_streaming = is_event_stream(&upstream.headers);
        if ctx.is_streaming {
            prepare_event_stream_headers(&mut response_headers);
            tracing::debug!("Streaming response as SSE");
        }

        let (sink, body) = ChannelSink::channel();
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;

        // Headers go out as soon as this response is returned, before the
        // first body chunk exists.
        let frames = Body::new(incoming).into_data_stream();
        tokio::spawn(pump_body(ctx, frames, sink, deadline).in_current_span());

        response
    }
}

/// Direct connections only: proxy environment variables are never read,
/// redirects are never followed and the request URI is sent as built.
fn upstream_client() -> UpstreamClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(CONNECT_TIMEOUT));

    let https = HttpsConnectorBuilder::new()
        .with_tls_config(tls_client_config())
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_timer(TokioTimer::new())
        .build(https)
}

fn tls_client_config() -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::warn!(error = %err, "Failed to load a native root certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded native root certificates");
    if roots.is_empty() {
        tracing::warn!("No root certificates found, https upstreams will fail");
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

/// Whether upstream headers announce an event stream.
pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains(EVENT_STREAM))
        .unwrap_or(false)
}

/// Client-facing headers for a relayed event stream.
pub fn prepare_event_stream_headers(headers: &mut HeaderMap) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.remove(header::CONTENT_LENGTH);
}

fn set_forwarding_headers(outbound: &mut HeaderMap, inbound: &HeaderMap, peer: &PeerInfo) {
    let values = [
        (X_FORWARDED_FOR, origin::client_ip(inbound, peer)),
        (X_FORWARDED_PROTO, origin::scheme(inbound, peer)),
    ];
    for (name, value) in values {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                outbound.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, value = %value, "Skipping unrepresentable forwarding header"),
        }
    }
}

fn log_request_metadata(parts: &Parts, peer: &PeerInfo) {
    tracing::debug!("Request headers:");
    for (name, value) in &parts.headers {
        if headers::is_sensitive(name) {
            tracing::debug!("  {}: [REDACTED]", name);
        } else {
            tracing::debug!("  {}: {}", name, String::from_utf8_lossy(value.as_bytes()));
        }
    }
    tracing::debug!(
        query = parts.uri.query().unwrap_or(""),
        content_length = ?parts.headers.get(header::CONTENT_LENGTH),
        remote_addr = %peer.remote_addr,
        "Request metadata"
    );
}

fn log_request_body(bytes: &Bytes) {
    if bytes.is_empty() {
        return;
    }
    let shown = &bytes[..bytes.len().min(DEBUG_BODY_LOG_LIMIT)];
    let text = String::from_utf8_lossy(shown);
    if bytes.len() > DEBUG_BODY_LOG_LIMIT {
        tracing::debug!(bytes = bytes.len(), "Request body (truncated): {}...", text);
    } else {
        tracing::debug!(bytes = bytes.len(), "Request body: {}", text);
    }
}

/// Copy an upstream body into `sink` in [`CHUNK_SIZE`] pieces.
///
/// In streaming mode every chunk is flushed as soon as it is written.
pub async fn pump_body<B, E, S>(mut ctx: RelayContext, body: B, mut sink: S, deadline: Instant) -> Completion
where
    B: Stream<Item = Result<Bytes, E>>,
    E: Display,
    S: BodySink,
{
    let mut body = pin!(body);
    let flush = ctx.is_streaming && sink.supports_flush();
    if ctx.is_streaming && !flush {
        FLUSH_UNSUPPORTED.call_once(|| {
            tracing::warn!("Response sink does not support flushing, streaming may not work properly");
        });
    }

    let mut reads: u64 = 0;
    let client_gone = flush && sink.flush().await.is_err();
    let outcome = 'relay: loop {
        if client_gone {
            break RelayOutcome::ClientGone;
        }

        let next = tokio::select! {
            biased;
            _ = sink.closed() => break RelayOutcome::ClientGone,
            next = timeout_at(deadline, body.next()) => next,
        };

        let mut data = match next {
            Err(_) => {
                tracing::warn!(reads, bytes = ctx.bytes_transferred, "Deadline exceeded while reading response body");
                break RelayOutcome::DeadlineExceeded;
            }
            Ok(None) => break RelayOutcome::Complete,
            Ok(Some(Err(e))) => {
                tracing::warn!(reads, bytes = ctx.bytes_transferred, error = %e, "Error reading response body");
                break RelayOutcome::UpstreamReadError;
            }
            Ok(Some(Ok(data))) => data,
        };
        reads += 1;

        while !data.is_empty() {
            let chunk = data.split_to(data.len().min(CHUNK_SIZE));
            ctx.bytes_transferred += chunk.len() as u64;
            let written = match sink.write(chunk).await {
                Ok(()) if flush => sink.flush().await,
                other => other,
            };
            if let Err(e) = written {
                tracing::warn!(error = %e, bytes = ctx.bytes_transferred, "Error writing to client");
                break 'relay RelayOutcome::ClientGone;
            }
        }
    };

    if outcome != RelayOutcome::ClientGone {
        if let Err(e) = sink.finish().await {
            tracing::warn!(error = %e, "Error finishing client response");
        }
    }

    ctx.advance(RelayState::Complete);
    let duration = ctx.started.elapsed();
    if outcome == RelayOutcome::Complete {
        tracing::debug!(reads, bytes = ctx.bytes_transferred, "Finished streaming");
    }
    tracing::info!(
        method = %ctx.method,
        path = %ctx.path,
        status = ctx.status.map(|s| s.as_u16()),
        duration_ms = duration.as_millis() as u64,
        bytes_transferred = ctx.bytes_transferred,
        streaming = ctx.is_streaming,
        outcome = ?outcome,
        "Completed request"
    );
    metrics::record_relay(
        &ctx.target.path_prefix,
        ctx.status.map(|s| s.as_u16()).unwrap_or(0),
        ctx.bytes_transferred,
        duration,
    );

    Completion {
        outcome,
        bytes_transferred: ctx.bytes_transferred,
        duration,
    }
}
