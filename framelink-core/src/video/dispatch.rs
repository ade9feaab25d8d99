//! Frame dispatch: adapts received bytes to the sink's call shape.
//!
//! The calling convention is fixed when the dispatcher is built, so the
//! receive loop never branches on the platform.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::SinkError;
use crate::video::sink::FrameSink;
use crate::video::types::{CallingConvention, DecodeRequest, FrameDimensions, Platform};

#[derive(Clone)]
pub struct FrameDispatch {
    sink: Arc<dyn FrameSink>,
    convention: CallingConvention,
    dimensions: FrameDimensions,
}

impl FrameDispatch {
    /// Dispatch with an explicit calling convention and the default
    /// 640x368 geometry.
    pub fn new(sink: Arc<dyn FrameSink>, convention: CallingConvention) -> Self {
        Self {
            sink,
            convention,
            dimensions: FrameDimensions::default(),
        }
    }

    /// Dispatch using the convention `platform` requires.
    pub fn for_platform(sink: Arc<dyn FrameSink>, platform: Platform) -> Self {
        Self::new(sink, platform.calling_convention())
    }

    /// Override the fixed geometry passed to explicit-dimension sinks.
    pub fn with_dimensions(mut self, dimensions: FrameDimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Shape `data` for this dispatcher's convention.
    pub fn request(&self, data: Bytes) -> DecodeRequest {
        match self.convention {
            CallingConvention::ExplicitDimensions => DecodeRequest::Sized {
                data,
                dimensions: self.dimensions,
            },
            CallingConvention::Inferred => DecodeRequest::Inferred { data },
        }
    }

    /// Hand one frame to the sink.
    pub async fn dispatch(&self, data: Bytes) -> Result<(), SinkError> {
        self.sink.decode(self.request(data)).await
    }
}

impl std::fmt::Debug for FrameDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDispatch")
            .field("convention", &self.convention)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}
