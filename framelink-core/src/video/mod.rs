//! # Video feed pipeline
//!
//! Receives frame buffers from a paired camera over WebSocket and hands
//! them to a platform decoder.
//!
//! ## Architecture
//!
//! ```text
//! DEVICE (CV200)                          APP
//! ┌────────────────┐                      ┌───────────────────────┐
//! │ H.264 encoder  │   binary frames      │ StreamClient          │
//! │                │ ───────────────►     │   ↓                   │
//! │ WebSocket srv  │                      │ FrameDispatch         │
//! │                │ ◄───────────────     │   ↓                   │
//! └────────────────┘   "OK" per frame     │ FrameSink (decoder)   │
//!                                         └───────────────────────┘
//! ```
//!
//! ## Sub-modules
//!
//! | Module     | Purpose                                              |
//! |----------- |------------------------------------------------------|
//! | `types`    | Frame geometry, platform and decode request types    |
//! | `sink`     | `FrameSink` trait, logging and channel sinks         |
//! | `record`   | Sink that writes the elementary stream to a file     |
//! | `annexb`   | Annex-B NAL reassembly in front of a decoder backend |
//! | `dispatch` | Platform-conditional call shaping                    |
//! | `client`   | Reconnecting WebSocket consumer                      |

pub mod annexb;
pub mod client;
pub mod dispatch;
pub mod record;
pub mod sink;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────

pub use annexb::{AnnexBSink, NalDecoder, NalSplitter, NalUnit, NalUnitType, TracingDecoder};
pub use client::{ConnectionHandle, StreamClient, StreamOptions, StreamStats};
pub use dispatch::FrameDispatch;
pub use record::RecordingSink;
pub use sink::{ChannelSink, FrameSink, LoggingSink};
pub use types::{CallingConvention, DecodeRequest, FrameDimensions, Platform};
