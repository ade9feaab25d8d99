//! # framelink-core
//!
//! Live camera feed plumbing for the CV200 companion app.
//!
//! This crate contains:
//! - **Endpoint**: the `(host, port)` of the device and its `ws://` URL
//! - **State**: `ClientPhase`, the validated connection state machine
//! - **Video**: `StreamClient` (reconnecting WebSocket consumer),
//!   `FrameDispatch` (platform-conditional call shaping), the `FrameSink`
//!   trait and its sinks, and Annex-B reassembly for decoder backends
//! - **Error**: `StreamError` / `SinkError`, typed, `thiserror`-based

pub mod endpoint;
pub mod error;
pub mod state;
pub mod video;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use endpoint::{DEFAULT_HOST, DEFAULT_PORT, Endpoint};
pub use error::{SinkError, StreamError};
pub use state::ClientPhase;
pub use video::client::{ACK_PAYLOAD, RECONNECT_DELAY};
pub use video::types::{FRAME_HEIGHT, FRAME_WIDTH};
pub use video::{
    AnnexBSink, CallingConvention, ChannelSink, ConnectionHandle, DecodeRequest, FrameDimensions,
    FrameDispatch, FrameSink, LoggingSink, NalDecoder, NalSplitter, NalUnit, NalUnitType,
    Platform, RecordingSink, StreamClient, StreamOptions, StreamStats, TracingDecoder,
};
