//! Client-facing response body sinks.
//!
//! # Responsibilities
//! - Accept relayed body chunks in order
//! - Expose flushing as an optional capability
//! - Report when the client has gone away
//!
//! # Design Decisions
//! - Writes are buffered; only `flush` guarantees bytes leave immediately
//! - A sink without flush support still relays, just not incrementally

use std::convert::Infallible;
use std::future::Future;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures_util::stream;
use thiserror::Error;
use tokio::sync::mpsc;

/// Buffered bytes held before a write is pushed without an explicit flush.
pub const SINK_BUFFER_SIZE: usize = 32 * 1024;

/// Frames in flight between the relay task and the HTTP connection.
const CHANNEL_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("client disconnected")]
    Closed,
}

/// Destination for a relayed response body.
pub trait BodySink: Send {
    /// Append a chunk. May buffer.
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Whether [`BodySink::flush`] pushes buffered bytes to the client.
    fn supports_flush(&self) -> bool {
        false
    }

    /// Push buffered bytes to the client now.
    fn flush(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send {
        async { Ok(()) }
    }

    /// Resolves once the client side is gone.
    fn closed(&self) -> impl Future<Output = ()> + Send {
        std::future::pending()
    }

    /// Push whatever is still buffered and end the body.
    fn finish(self) -> impl Future<Output = Result<(), SinkError>> + Send
    where
        Self: Sized;
}

/// Sink feeding an axum streaming [`Body`] through a bounded channel.
///
/// Every send becomes one body frame, which hyper writes out as soon as it
/// is polled, so `flush` maps to "send what is buffered".
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    pending: BytesMut,
}

impl ChannelSink {
    /// Create a sink and the response body it feeds.
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
        });
        let sink = Self {
            tx,
            pending: BytesMut::with_capacity(SINK_BUFFER_SIZE),
        };
        (sink, Body::from_stream(frames))
    }

    async fn send_pending(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let frame = self.pending.split().freeze();
        self.tx.send(frame).await.map_err(|_| SinkError::Closed)
    }
}

impl BodySink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }
        self.pending.extend_from_slice(&chunk);
        if self.pending.len() >= SINK_BUFFER_SIZE {
            self.send_pending().await?;
        }
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        true
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.send_pending().await
    }

    fn closed(&self) -> impl Future<Output = ()> + Send {
        self.tx.closed()
    }

    async fn finish(mut self) -> Result<(), SinkError> {
        self.send_pending().await
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn writes_are_buffered_until_flush() {
        let (mut sink, body) = ChannelSink::channel();
        let mut frames = body.into_data_stream();

        sink.write(Bytes::from_static(b"data: a\n\n")).await.unwrap();
        sink.write(Bytes::from_static(b"data: b\n\n")).await.unwrap();
        sink.flush().await.unwrap();

        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"data: a\n\ndata: b\n\n");
    }

    #[tokio::test]
    async fn large_writes_spill_without_flush() {
        let (mut sink, body) = ChannelSink::channel();
        let mut frames = body.into_data_stream();

        sink.write(Bytes::from(vec![7u8; SINK_BUFFER_SIZE])).await.unwrap();
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.len(), SINK_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn finish_drains_and_ends_body() {
        let (mut sink, body) = ChannelSink::channel();
        sink.write(Bytes::from_static(b"tail")).await.unwrap();
        sink.finish().await.unwrap();

        let collected = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&collected[..], b"tail");
    }

    #[tokio::test]
    async fn dropped_body_closes_sink() {
        let (mut sink, body) = ChannelSink::channel();
        drop(body);

        sink.closed().await;
        assert_eq!(sink.write(Bytes::from_static(b"x")).await, Err(SinkError::Closed));
        assert_eq!(sink.flush().await, Ok(()));
    }
}
