//! Shared utilities for integration tests: mock upstreams and a relay
//! instance, both on ephemeral ports.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use api_relay::config::{ProxyConfig, ProxyTarget};
use api_relay::http::{HttpServer, RelayEngine, RelaySettings};
use api_relay::lifecycle::Shutdown;
use api_relay::net;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    Router,
};
use bytes::Bytes;
use futures_util::stream;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;

/// Serve `router` as an upstream on a random local port.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A running relay. Shuts down when dropped.
pub struct Proxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl Proxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a relay whose targets point at local plaintext upstreams.
pub fn spawn_proxy(targets: &[(&str, SocketAddr)], configure: impl FnOnce(&mut ProxyConfig)) -> Proxy {
    let mut config = ProxyConfig::default();
    config.targets = targets
        .iter()
        .map(|(prefix, addr)| ProxyTarget::new(*prefix, addr.to_string()))
        .collect();
    configure(&mut config);

    let engine = RelayEngine::new(RelaySettings::from(&config)).with_upstream_scheme("http");
    let server = HttpServer::with_engine(config, engine);

    // Bound before spawning, so connections queue until the server accepts.
    let listener = net::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    Proxy { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// GET `target` from `addr` with the request line exactly as written.
/// reqwest re-encodes quotes in queries, so this goes through hyper.
pub async fn raw_get(addr: SocketAddr, target: &str) -> Response<Incoming> {
    let uri = format!("http://{addr}{target}");
    let request = Request::get(uri.as_str()).body(Body::empty()).unwrap();
    Client::builder(TokioExecutor::new())
        .build_http::<Body>()
        .request(request)
        .await
        .unwrap()
}

/// Echo the request body back; request metadata comes back as
/// `x-echo-*` response headers.
pub async fn echo(request: Request<Body>) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert("x-echo-method", HeaderValue::from_str(parts.method.as_str()).unwrap());
    headers.insert("x-echo-path", HeaderValue::from_str(parts.uri.path()).unwrap());
    headers.insert(
        "x-echo-query",
        HeaderValue::from_str(parts.uri.query().unwrap_or("")).unwrap(),
    );
    for (name, value) in &parts.headers {
        let echoed = HeaderName::from_bytes(format!("x-echo-{name}").as_bytes()).unwrap();
        headers.append(echoed, value.clone());
    }
    response
}

/// An event stream that waits `first_delay` before its first event and
/// `gap` between events.
pub fn event_stream(events: &'static [&'static str], first_delay: Duration, gap: Duration) -> Response<Body> {
    let frames = stream::unfold(0usize, move |i| async move {
        let event = events.get(i)?;
        tokio::time::sleep(if i == 0 { first_delay } else { gap }).await;
        Some((Ok::<_, Infallible>(Bytes::from_static(event.as_bytes())), i + 1))
    });
    Response::builder()
        .header("content-type", "text/event-stream; charset=utf-8")
        .body(Body::from_stream(frames))
        .unwrap()
}

/// A port nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
