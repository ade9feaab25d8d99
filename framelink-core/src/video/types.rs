//! Shared types for the frame hand-off pipeline.
//!
//! A received payload becomes a [`DecodeRequest`] whose shape depends on
//! the host platform's [`CallingConvention`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Frame width the CV200 encodes at. Never derived from the payload.
pub const FRAME_WIDTH: u32 = 640;

/// Frame height the CV200 encodes at. Never derived from the payload.
pub const FRAME_HEIGHT: u32 = 368;

// ── FrameDimensions ──────────────────────────────────────────────

/// Pixel dimensions handed to decoders that need them up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameDimensions {
    fn default() -> Self {
        Self::new(FRAME_WIDTH, FRAME_HEIGHT)
    }
}

impl std::fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── Platform ─────────────────────────────────────────────────────

/// Host platform family. Decides both the decoder calling convention
/// and which native video surface gets mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// The platform this binary was compiled for. Anything that is not
    /// iOS is treated as the Android family.
    pub const fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Android
        }
    }

    pub const fn calling_convention(self) -> CallingConvention {
        match self {
            Platform::Android => CallingConvention::ExplicitDimensions,
            Platform::Ios => CallingConvention::Inferred,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
        }
    }
}

// ── CallingConvention ────────────────────────────────────────────

/// How a platform decoder expects to be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// `decode(bytes, width, height)`.
    ExplicitDimensions,
    /// `decode(bytes)`; the decoder reads geometry from the SPS.
    Inferred,
}

// ── DecodeRequest ────────────────────────────────────────────────

/// One frame, shaped for a specific calling convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeRequest {
    /// Payload plus the fixed frame geometry.
    Sized {
        data: Bytes,
        dimensions: FrameDimensions,
    },
    /// Payload only.
    Inferred { data: Bytes },
}

impl DecodeRequest {
    pub fn data(&self) -> &Bytes {
        match self {
            DecodeRequest::Sized { data, .. } | DecodeRequest::Inferred { data } => data,
        }
    }

    /// Explicit dimensions, if this request carries any.
    pub fn dimensions(&self) -> Option<FrameDimensions> {
        match self {
            DecodeRequest::Sized { dimensions, .. } => Some(*dimensions),
            DecodeRequest::Inferred { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }
}
