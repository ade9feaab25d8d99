//! The Frame Sink capability and the simple sinks that ship with it.
//!
//! A sink receives every frame the client accepts. Whatever it does with
//! the bytes (hand them to a hardware decoder, write them to disk, push
//! them to another thread) is opaque to the client. Errors are logged by
//! the caller and never retried.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SinkError;
use crate::video::types::DecodeRequest;

/// Something that can consume decode-ready frames.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Hand one frame to the decoder. Completes when the decoder has
    /// accepted (or rejected) it.
    async fn decode(&self, request: DecodeRequest) -> Result<(), SinkError>;
}

// ── LoggingSink ──────────────────────────────────────────────────

/// Sink that only traces frame sizes. Useful when no decoder is present.
#[derive(Debug, Default)]
pub struct LoggingSink {
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames seen so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Payload bytes seen so far.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FrameSink for LoggingSink {
    async fn decode(&self, request: DecodeRequest) -> Result<(), SinkError> {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        self.bytes.fetch_add(request.len() as u64, Ordering::Relaxed);
        match request.dimensions() {
            Some(dims) => debug!(frame = n, len = request.len(), %dims, "frame"),
            None => debug!(frame = n, len = request.len(), "frame"),
        }
        Ok(())
    }
}

// ── ChannelSink ──────────────────────────────────────────────────

/// Sink that forwards requests to a decoder task over a bounded channel.
///
/// Applies backpressure: `decode` waits while the channel is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<DecodeRequest>,
}

impl ChannelSink {
    /// Create a sink and the receiver the decoder should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DecodeRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn decode(&self, request: DecodeRequest) -> Result<(), SinkError> {
        self.tx.send(request).await?;
        Ok(())
    }
}
