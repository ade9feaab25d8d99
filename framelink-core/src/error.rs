//! Domain-specific error types for the frame pipeline.
//!
//! Transport-level failures are [`StreamError`]s; anything a Frame Sink
//! reports is a [`SinkError`]. Neither is ever surfaced to the display
//! layer: the client logs them and keeps going.

use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The canonical error type for the stream client.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The WebSocket layer reported an error (handshake, read, write).
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── State Errors ─────────────────────────────────────────────
    /// A phase transition was requested from the wrong phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    /// The decode worker is gone and cannot take more frames.
    #[error("decode worker closed")]
    ChannelClosed,
}

// ── SinkError ────────────────────────────────────────────────────

/// Errors reported by a [`FrameSink`](crate::video::sink::FrameSink).
///
/// These are swallowed by the client after logging; they never affect
/// the connection.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The decoder refused the frame.
    #[error("frame rejected: {0}")]
    Rejected(String),

    /// The platform decoder backend failed.
    #[error("decoder backend error: {0}")]
    Backend(String),

    /// The reassembly buffer would grow past its cap.
    #[error("reassembly buffer overflow: {size} bytes (max {max})")]
    BufferOverflow { size: usize, max: usize },

    /// The receiving side of a channel sink is gone.
    #[error("sink channel closed")]
    ChannelClosed,

    /// Writing the frame to disk failed.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SinkError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SinkError::ChannelClosed
    }
}
