//! Stream client connection state machine.
//!
//! Provides a `ClientPhase` enum that models the lifecycle of the single
//! WebSocket connection a client owns, with validated transitions that
//! return `Result` instead of panicking.

use std::time::Instant;

use crate::error::StreamError;

// ── ClientPhase ──────────────────────────────────────────────────

/// The current phase of the client's connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Open ──► Closing
///       ▲               │            │         │
///       │               ▼            ▼         │
///       └───────────────┴────────────┴─────────┘
/// ```
///
/// `Closing` is only entered on a manual teardown. An unexpected drop
/// goes straight from `Open` (or a failed `Connecting`) back to
/// `Disconnected`, after which the client reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientPhase {
    /// No live connection. Initial state.
    #[default]
    Disconnected,

    /// WebSocket handshake in flight.
    Connecting,

    /// Connection established; frames are flowing.
    Open {
        /// When the connection entered the `Open` state.
        since: Instant,
    },

    /// Manual teardown in progress (close frame being sent).
    Closing,
}

impl std::fmt::Display for ClientPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open { .. } => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

impl ClientPhase {
    /// Returns `true` while a connection is established.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Returns `true` when there is no connection at all.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the connection has been open.
    ///
    /// Returns `None` for any other phase.
    pub fn open_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Open { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot connect: previous connection not closed",
            )),
        }
    }

    /// Transition to `Open`.
    ///
    /// Valid from: `Connecting`.
    pub fn open(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connecting => {
                *self = Self::Open {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot open: not in Connecting state",
            )),
        }
    }

    /// Transition to `Closing`.
    ///
    /// Valid from: `Open`.
    pub fn begin_close(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Open { .. } => {
                *self = Self::Closing;
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot close: not in Open state",
            )),
        }
    }

    /// Transition to `Disconnected`.
    ///
    /// Valid from: `Closing`, `Open` (unexpected drop), `Connecting`
    /// (handshake failure).
    pub fn finish_close(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Closing | Self::Open { .. } | Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            Self::Disconnected => Err(StreamError::InvalidTransition(
                "cannot finish close: already disconnected",
            )),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
