//! Viewer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framelink_core::{Endpoint, FrameDimensions, Platform, StreamOptions};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Device connection.
    pub network: NetworkConfig,
    /// Frame hand-off.
    pub video: VideoConfig,
    /// Layout.
    pub display: DisplayConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Device connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Device IP address.
    pub host: String,
    /// Device WebSocket port.
    pub port: u16,
    /// Delay before reconnecting after a drop, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Slow-decode threshold and teardown drain limit, in milliseconds.
    pub decode_timeout_ms: u64,
}

/// Which sink receives frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Annex-B reassembly into the decoder backend.
    Annexb,
    /// Trace frame sizes only.
    Log,
    /// Append the raw stream to `record_path`.
    Record,
}

/// Frame hand-off settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame width passed to explicit-dimension decoders.
    pub width: u32,
    /// Frame height passed to explicit-dimension decoders.
    pub height: u32,
    /// Platform override; detected from the build target when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub sink: SinkKind,
    /// Output file for `sink = "record"`.
    pub record_path: PathBuf,
}

/// Layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Viewport width in layout units.
    pub viewport_width: u32,
    /// Viewport height in layout units.
    pub viewport_height: u32,
    /// Horizontal space taken off the viewport width.
    pub margin: u32,
    /// Fixed height of the video surface.
    pub surface_height: u32,
    /// Image drawn over the video.
    pub overlay_image: PathBuf,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (`RUST_LOG` wins when set).
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        let opts = StreamOptions::default();
        Self {
            host: framelink_core::DEFAULT_HOST.into(),
            port: framelink_core::DEFAULT_PORT,
            reconnect_delay_ms: opts.reconnect_delay.as_millis() as u64,
            connect_timeout_ms: opts.connect_timeout.as_millis() as u64,
            decode_timeout_ms: opts.decode_timeout.as_millis() as u64,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: framelink_core::FRAME_WIDTH,
            height: framelink_core::FRAME_HEIGHT,
            platform: None,
            sink: SinkKind::Annexb,
            record_path: "framelink.h264".into(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            viewport_width: 390,
            viewport_height: 844,
            margin: crate::display::SURFACE_MARGIN,
            surface_height: crate::display::SURFACE_HEIGHT,
            overlay_image: "assets/silhh-red.png".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Derived values ───────────────────────────────────────────────

impl NetworkConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            decode_timeout: Duration::from_millis(self.decode_timeout_ms),
        }
    }
}

impl VideoConfig {
    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.width, self.height)
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_device() {
        let cfg = ViewerConfig::default();
        assert_eq!(cfg.network.endpoint().url(), "ws://192.168.43.1:13456");
        assert_eq!(cfg.network.stream_options(), StreamOptions::default());
        assert_eq!(cfg.video.dimensions(), FrameDimensions::new(640, 368));
        assert_eq!(cfg.display.margin, 30);
        assert_eq!(cfg.display.surface_height, 200);
    }

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ViewerConfig::default()).unwrap();
        assert!(text.contains("host"));
        assert!(text.contains("reconnect_delay_ms"));
        assert!(text.contains("overlay_image"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: ViewerConfig = toml::from_str(
            r#"
            [network]
            host = "10.0.0.2"

            [video]
            platform = "ios"
            sink = "record"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.host, "10.0.0.2");
        assert_eq!(cfg.network.port, 13456);
        assert_eq!(cfg.video.platform(), Platform::Ios);
        assert_eq!(cfg.video.sink, SinkKind::Record);
        assert_eq!(cfg.display.surface_height, 200);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ViewerConfig::load(&dir.path().join("framelink.toml"));
        assert_eq!(cfg.network.port, 13456);
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framelink.toml");
        ViewerConfig::write_default(&path).unwrap();
        let cfg = ViewerConfig::load(&path);
        assert_eq!(cfg.network.host, "192.168.43.1");
        assert_eq!(cfg.video.sink, SinkKind::Annexb);
    }
}
