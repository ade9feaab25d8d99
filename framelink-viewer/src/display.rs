//! Display composition: video surface with a static overlay on top.
//!
//! The layout is a pure function of the viewport width. Drawing is left
//! to a [`RenderSurface`], which on a device wraps the platform's native
//! video view; [`LogSurface`] stands in for it on hosts without one.

use std::path::PathBuf;

use tracing::info;

use framelink_core::Platform;

use crate::config::DisplayConfig;

/// Horizontal space taken off the viewport width.
pub const SURFACE_MARGIN: u32 = 30;

/// Fixed height of the video surface and its container.
pub const SURFACE_HEIGHT: u32 = 200;

// ── Geometry ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

// ── NativeSurface ────────────────────────────────────────────────

/// Platform view that the decoder renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeSurface {
    /// Android `TextureView` fed by `MediaCodec`.
    VideoSurfaceView,
    /// iOS `UIView` fed by VideoToolbox.
    VideoView,
}

impl NativeSurface {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Android => Self::VideoSurfaceView,
            Platform::Ios => Self::VideoView,
        }
    }

    /// Registered component name.
    pub fn name(self) -> &'static str {
        match self {
            Self::VideoSurfaceView => "VideoSurfaceView",
            Self::VideoView => "VideoView",
        }
    }
}

// ── Layout ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Video {
        surface: NativeSurface,
        frame: Rect,
    },
    /// Absolutely positioned over the whole container.
    Overlay {
        image: PathBuf,
        bounds: Rect,
        image_frame: Rect,
    },
}

impl Layer {
    pub fn z_index(&self) -> u32 {
        match self {
            Layer::Video { .. } => 0,
            Layer::Overlay { .. } => 1,
        }
    }
}

/// Layers in back-to-front order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub container: Rect,
    pub layers: Vec<Layer>,
}

impl Layout {
    pub fn compute(viewport_width: u32, config: &DisplayConfig, platform: Platform) -> Self {
        let container = Rect::sized(viewport_width, config.surface_height);
        let inner = Rect::sized(
            viewport_width.saturating_sub(config.margin),
            config.surface_height,
        );

        let mut layers = vec![
            Layer::Overlay {
                image: config.overlay_image.clone(),
                bounds: container,
                image_frame: inner,
            },
            Layer::Video {
                surface: NativeSurface::for_platform(platform),
                frame: inner,
            },
        ];
        layers.sort_by_key(Layer::z_index);

        Self { container, layers }
    }

    pub fn video(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| matches!(l, Layer::Video { .. }))
    }

    pub fn overlay(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| matches!(l, Layer::Overlay { .. }))
    }
}

// ── RenderSurface ────────────────────────────────────────────────

/// Where a [`Layout`] ends up on screen.
pub trait RenderSurface {
    /// Mount (or re-mount) the layers.
    fn mount(&mut self, layout: &Layout) -> Result<(), String>;

    /// Remove everything mounted.
    fn unmount(&mut self);
}

/// Surface that records mounts in the log.
#[derive(Debug, Default)]
pub struct LogSurface {
    mounts: u32,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounts(&self) -> u32 {
        self.mounts
    }
}

impl RenderSurface for LogSurface {
    fn mount(&mut self, layout: &Layout) -> Result<(), String> {
        self.mounts += 1;
        for layer in &layout.layers {
            match layer {
                Layer::Video { surface, frame } => info!(
                    z = layer.z_index(),
                    surface = surface.name(),
                    width = frame.width,
                    height = frame.height,
                    "video layer"
                ),
                Layer::Overlay { image, bounds, .. } => info!(
                    z = layer.z_index(),
                    image = %image.display(),
                    width = bounds.width,
                    height = bounds.height,
                    "overlay layer"
                ),
            }
        }
        Ok(())
    }

    fn unmount(&mut self) {
        info!("display unmounted");
    }
}

// ── Composition ──────────────────────────────────────────────────

/// Keeps a surface in sync with the viewport.
pub struct Composition<R> {
    surface: R,
    config: DisplayConfig,
    platform: Platform,
    layout: Option<Layout>,
}

impl<R: RenderSurface> Composition<R> {
    pub fn new(surface: R, config: DisplayConfig, platform: Platform) -> Self {
        Self {
            surface,
            config,
            platform,
            layout: None,
        }
    }

    /// Recompute and re-mount if the viewport width changed.
    ///
    /// Returns whether a mount happened. A failed mount leaves the
    /// previous layout in place.
    pub fn update(&mut self, viewport: Viewport) -> Result<bool, String> {
        if self
            .layout
            .as_ref()
            .is_some_and(|l| l.container.width == viewport.width)
        {
            return Ok(false);
        }

        let layout = Layout::compute(viewport.width, &self.config, self.platform);
        self.surface.mount(&layout)?;
        self.layout = Some(layout);
        Ok(true)
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn unmount(&mut self) {
        if self.layout.take().is_some() {
            self.surface.unmount();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
