//! framelink viewer entry point.
//!
//! ```text
//! framelink-viewer                        Connect with defaults
//! framelink-viewer --config <path>        Use custom config TOML
//! framelink-viewer --device 10.0.0.2:9000 Override the device address
//! framelink-viewer --gen-config           Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use framelink_core::{ClientPhase, Endpoint, StreamClient};

use framelink_viewer::config::ViewerConfig;
use framelink_viewer::display::{Composition, LogSurface, Viewport};
use framelink_viewer::sink::build_dispatch;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framelink-viewer", about = "Live camera feed viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framelink.toml")]
    config: PathBuf,

    /// Device address (overrides config). Example: 192.168.43.1:13456
    #[arg(short, long)]
    device: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(addr) = cli.device {
        let endpoint = Endpoint::parse(&addr).ok_or_else(|| format!("invalid device address: {addr}"))?;
        config.network.host = endpoint.host().to_string();
        config.network.port = endpoint.port();
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framelink-viewer v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Compose the display ──────────────────────────────────

    let platform = config.video.platform();
    let mut composition = Composition::new(LogSurface::new(), config.display.clone(), platform);
    composition.update(Viewport {
        width: config.display.viewport_width,
        height: config.display.viewport_height,
    })?;
    info!(%platform, "display composed");

    // ── 2. Start the stream client ──────────────────────────────

    let dispatch = build_dispatch(&config.video).await?;
    let endpoint = config.network.endpoint();
    info!(%endpoint, sink = ?config.video.sink, "starting stream client");

    let handle = StreamClient::new(endpoint, dispatch)
        .with_options(config.network.stream_options())
        .connect();
    let mut phase_rx = handle.phase();
    let stats_rx = handle.stats();

    // ── 3. Run until interrupted ────────────────────────────────

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut was_open = false;
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("failed to listen for ctrl-c: {e}");
                }
                break;
            }
            changed = phase_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let phase = phase_rx.borrow_and_update().clone();
                match phase {
                    ClientPhase::Open { .. } => was_open = true,
                    ClientPhase::Disconnected if was_open => {
                        was_open = false;
                        let stats = stats_rx.borrow().clone();
                        info!(
                            frames = stats.frames_received,
                            acks = stats.acks_sent,
                            decode_failures = stats.decode_failures,
                            "connection lost; reconnecting"
                        );
                    }
                    _ => debug!(%phase, "stream phase"),
                }
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    handle.disconnect().await;
    composition.unmount();

    let stats = stats_rx.borrow().clone();
    info!(
        frames = stats.frames_received,
        bytes = stats.bytes_received,
        decoded = stats.frames_decoded,
        slow = stats.slow_decodes,
        sessions = stats.sessions_opened,
        "stream closed"
    );

    Ok(())
}
