//! Reconnecting frame consumer.
//!
//! Owns the one WebSocket connection to the device, queues every binary
//! message for the [`FrameDispatch`], and answers each with `"OK"` as
//! soon as it is queued. A single decode worker drains the queue in
//! arrival order, so a slow decoder never holds back the receive loop.
//! When the connection drops for any reason other than a manual
//! teardown, a single reconnect is scheduled after [`RECONNECT_DELAY`].
//!
//! Phase and counters are published through `tokio::sync::watch`
//! channels so the display layer can observe the client without
//! touching the receive loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::StreamError;
use crate::state::ClientPhase;
use crate::video::dispatch::FrameDispatch;

/// Pause between an unexpected closure and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(200);

/// Text sent back after every binary frame.
pub const ACK_PAYLOAD: &str = "OK";

// ── StreamOptions ────────────────────────────────────────────────

/// Timing knobs for a [`StreamClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Fixed delay before reconnecting. Never grows.
    pub reconnect_delay: Duration,
    /// Give up on a handshake after this long; counts as a closure.
    pub connect_timeout: Duration,
    /// A decode slower than this is logged and counted as slow. Also
    /// bounds how long teardown waits for queued frames to drain.
    pub decode_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: RECONNECT_DELAY,
            connect_timeout: Duration::from_secs(5),
            decode_timeout: Duration::from_secs(1),
        }
    }
}

// ── StreamStats ──────────────────────────────────────────────────

/// Counters exposed to the UI. Cumulative across reconnections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub connect_attempts: u64,
    pub sessions_opened: u64,
    pub reconnects_scheduled: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub acks_sent: u64,
    /// Frames the sink has finished with, successfully or not.
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub slow_decodes: u64,
    /// Text, ping and pong messages that were skipped.
    pub ignored_messages: u64,
}

// ── Teardown ─────────────────────────────────────────────────────

/// Manual-disconnect flag plus the token that interrupts the live
/// session or a pending reconnect sleep.
#[derive(Debug, Default)]
struct Teardown {
    manual: AtomicBool,
    cancel: CancellationToken,
}

impl Teardown {
    fn request(&self) {
        self.manual.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn requested(&self) -> bool {
        self.manual.load(Ordering::SeqCst)
    }
}

/// Why a session ended.
enum SessionEnd {
    /// Peer closed, transport failed, or the handshake never completed.
    Dropped,
    /// Manual teardown.
    TornDown,
}

// ── DecodeWorker ─────────────────────────────────────────────────

/// Feeds queued frames to the dispatcher one at a time.
struct DecodeWorker {
    dispatch: FrameDispatch,
    stats_tx: Arc<watch::Sender<StreamStats>>,
    slow_after: Duration,
}

impl DecodeWorker {
    fn spawn(self) -> (mpsc::UnboundedSender<Bytes>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, tokio::spawn(self.run(rx)))
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<Bytes>) {
        while let Some(frame) = rx.recv().await {
            let len = frame.len();
            let started = Instant::now();
            let outcome = self.dispatch.dispatch(frame).await;
            let elapsed = started.elapsed();

            if let Err(e) = &outcome {
                warn!(len, error = %e, "frame decode failed");
            }
            let slow = elapsed > self.slow_after;
            if slow {
                warn!(len, ?elapsed, "slow frame decode");
            }
            self.stats_tx.send_modify(|s| {
                s.frames_decoded += 1;
                s.decode_failures += u64::from(outcome.is_err());
                s.slow_decodes += u64::from(slow);
            });
        }
    }
}

// ── StreamClient ─────────────────────────────────────────────────

/// Reconnecting consumer for a single device endpoint.
pub struct StreamClient {
    endpoint: Endpoint,
    dispatch: FrameDispatch,
    options: StreamOptions,
    phase_tx: watch::Sender<ClientPhase>,
    stats_tx: Arc<watch::Sender<StreamStats>>,
}

impl StreamClient {
    pub fn new(endpoint: Endpoint, dispatch: FrameDispatch) -> Self {
        let (phase_tx, _) = watch::channel(ClientPhase::default());
        let (stats_tx, _) = watch::channel(StreamStats::default());
        Self {
            endpoint,
            dispatch,
            options: StreamOptions::default(),
            phase_tx,
            stats_tx: Arc::new(stats_tx),
        }
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Obtain a `watch::Receiver` for the connection phase.
    pub fn phase_receiver(&self) -> watch::Receiver<ClientPhase> {
        self.phase_tx.subscribe()
    }

    /// Obtain a `watch::Receiver` for the client counters.
    pub fn stats_receiver(&self) -> watch::Receiver<StreamStats> {
        self.stats_tx.subscribe()
    }

    /// Start the client on the current runtime.
    ///
    /// The returned handle is the only way to stop it. Dropping the handle
    /// stops it too, including a reconnect that is already scheduled.
    pub fn connect(self) -> ConnectionHandle {
        let teardown = Arc::new(Teardown::default());
        let phase_rx = self.phase_receiver();
        let stats_rx = self.stats_receiver();
        let task = tokio::spawn(self.run(Arc::clone(&teardown)));
        ConnectionHandle {
            teardown,
            task: Some(task),
            phase_rx,
            stats_rx,
        }
    }

    // ── Connection loop ──────────────────────────────────────────

    async fn run(self, teardown: Arc<Teardown>) {
        let url = self.endpoint.url();
        let (frames, worker) = DecodeWorker {
            dispatch: self.dispatch.clone(),
            stats_tx: Arc::clone(&self.stats_tx),
            slow_after: self.options.decode_timeout,
        }
        .spawn();

        loop {
            if teardown.requested() {
                break;
            }

            self.transition(ClientPhase::begin_connect);
            self.record(|s| s.connect_attempts += 1);
            debug!(%url, "connecting");

            let attempt = tokio::select! {
                biased;
                _ = teardown.cancel.cancelled() => {
                    self.transition(ClientPhase::finish_close);
                    break;
                }
                attempt = tokio::time::timeout(
                    self.options.connect_timeout,
                    tokio_tungstenite::connect_async(url.as_str()),
                ) => attempt,
            };

            let end = match attempt {
                Ok(Ok((ws, _response))) => {
                    self.transition(ClientPhase::open);
                    self.record(|s| s.sessions_opened += 1);
                    info!(endpoint = %self.endpoint, "connected");
                    self.session(ws, &frames, &teardown).await
                }
                Ok(Err(e)) => {
                    warn!(endpoint = %self.endpoint, error = %StreamError::from(e), "connection failed");
                    SessionEnd::Dropped
                }
                Err(_) => {
                    let e = StreamError::Timeout(self.options.connect_timeout);
                    warn!(endpoint = %self.endpoint, error = %e, "connection failed");
                    SessionEnd::Dropped
                }
            };
            self.transition(ClientPhase::finish_close);

            // A teardown may have landed while the session was ending.
            if matches!(end, SessionEnd::TornDown) || teardown.requested() {
                break;
            }

            self.record(|s| s.reconnects_scheduled += 1);
            debug!(delay = ?self.options.reconnect_delay, "reconnect scheduled");
            tokio::select! {
                biased;
                _ = teardown.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.reconnect_delay) => {}
            }
        }

        drop(frames);
        self.drain(worker).await;
        debug!(endpoint = %self.endpoint, "stream client stopped");
    }

    /// Let frames that were already acknowledged reach the sink, for at
    /// most `decode_timeout`.
    async fn drain(&self, mut worker: JoinHandle<()>) {
        match tokio::time::timeout(self.options.decode_timeout, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "decode worker failed"),
            Err(_) => {
                warn!(timeout = ?self.options.decode_timeout, "decoder still busy; abandoning queued frames");
                worker.abort();
            }
        }
    }

    /// Pump one live connection until it ends.
    async fn session<S>(
        &self,
        mut ws: S,
        frames: &mpsc::UnboundedSender<Bytes>,
        teardown: &Teardown,
    ) -> SessionEnd
    where
        S: Stream<Item = Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Unpin,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = teardown.cancel.cancelled() => {
                    self.transition(ClientPhase::begin_close);
                    match tokio::time::timeout(self.options.connect_timeout, ws.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(error = %e, "close handshake failed"),
                        Err(_) => debug!("close handshake timed out"),
                    }
                    info!(endpoint = %self.endpoint, "disconnected");
                    return SessionEnd::TornDown;
                }
                next = ws.next() => next,
            };

            match next {
                Some(Ok(Message::Binary(data))) => {
                    if let Err(e) = self.on_frame(&mut ws, frames, data).await {
                        warn!(error = %e, "failed to acknowledge frame");
                        return SessionEnd::Dropped;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(endpoint = %self.endpoint, ?frame, "closed by device");
                    return SessionEnd::Dropped;
                }
                Some(Ok(_)) => self.record(|s| s.ignored_messages += 1),
                Some(Err(e)) => {
                    warn!(endpoint = %self.endpoint, error = %StreamError::from(e), "transport error");
                    return SessionEnd::Dropped;
                }
                None => {
                    info!(endpoint = %self.endpoint, "connection closed");
                    return SessionEnd::Dropped;
                }
            }
        }
    }

    /// Queue one frame for the decode worker, then acknowledge it.
    async fn on_frame<S>(
        &self,
        ws: &mut S,
        frames: &mpsc::UnboundedSender<Bytes>,
        data: Vec<u8>,
    ) -> Result<(), StreamError>
    where
        S: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let len = data.len();
        self.record(|s| {
            s.frames_received += 1;
            s.bytes_received += len as u64;
        });

        if frames.send(Bytes::from(data)).is_err() {
            warn!(len, error = %StreamError::ChannelClosed, "frame dropped");
            self.record(|s| s.decode_failures += 1);
        }

        ws.send(Message::Text(ACK_PAYLOAD.to_owned())).await?;
        self.record(|s| s.acks_sent += 1);
        Ok(())
    }

    // ── Observability ────────────────────────────────────────────

    fn transition(&self, f: impl FnOnce(&mut ClientPhase) -> Result<(), StreamError>) {
        let mut outcome = Ok(());
        self.phase_tx.send_modify(|phase| outcome = f(phase));
        if let Err(e) = outcome {
            debug!(error = %e, "phase transition skipped");
        }
    }

    fn record(&self, f: impl FnOnce(&mut StreamStats)) {
        self.stats_tx.send_modify(f);
    }
}

// ── ConnectionHandle ─────────────────────────────────────────────

/// Owned handle to a running [`StreamClient`].
///
/// Holding the handle keeps the client alive; [`disconnect`] or dropping
/// it ends the client for good.
///
/// [`disconnect`]: ConnectionHandle::disconnect
pub struct ConnectionHandle {
    teardown: Arc<Teardown>,
    task: Option<JoinHandle<()>>,
    phase_rx: watch::Receiver<ClientPhase>,
    stats_rx: watch::Receiver<StreamStats>,
}

impl ConnectionHandle {
    pub fn phase(&self) -> watch::Receiver<ClientPhase> {
        self.phase_rx.clone()
    }

    pub fn stats(&self) -> watch::Receiver<StreamStats> {
        self.stats_rx.clone()
    }

    /// Whether the client task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Mark the teardown as manual, close the live connection and wait
    /// for the client task to exit. No reconnect happens afterwards.
    pub async fn disconnect(mut self) {
        self.teardown.request();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "stream client task failed");
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.teardown.request();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("manual_disconnect", &self.teardown.requested())
            .field("phase", &*self.phase_rx.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::sink::{ChannelSink, LoggingSink};
    use crate::video::types::Platform;

    #[test]
    fn default_options() {
        let opts = StreamOptions::default();
        assert_eq!(opts.reconnect_delay, Duration::from_millis(200));
        assert_eq!(opts.connect_timeout, Duration::from_secs(5));
        assert_eq!(opts.decode_timeout, Duration::from_secs(1));
    }

    #[test]
    fn teardown_sets_flag_and_cancels() {
        let t = Teardown::default();
        assert!(!t.requested());
        t.request();
        assert!(t.requested());
        assert!(t.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn worker_feeds_sink_in_arrival_order() {
        let (sink, mut rx) = ChannelSink::channel(8);
        let (stats_tx, stats_rx) = watch::channel(StreamStats::default());
        let (frames, worker) = DecodeWorker {
            dispatch: FrameDispatch::for_platform(Arc::new(sink), Platform::Ios),
            stats_tx: Arc::new(stats_tx),
            slow_after: Duration::from_secs(1),
        }
        .spawn();

        for i in 0u8..3 {
            frames.send(Bytes::from(vec![i; 4])).unwrap();
        }
        drop(frames);
        worker.await.unwrap();

        for i in 0u8..3 {
            assert_eq!(rx.recv().await.unwrap().data()[0], i);
        }
        let stats = stats_rx.borrow();
        assert_eq!(stats.frames_decoded, 3);
        assert_eq!(stats.decode_failures, 0);
        assert_eq!(stats.slow_decodes, 0);
    }

    #[tokio::test]
    async fn worker_counts_failures() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        let (stats_tx, stats_rx) = watch::channel(StreamStats::default());
        let (frames, worker) = DecodeWorker {
            dispatch: FrameDispatch::for_platform(Arc::new(sink), Platform::Android),
            stats_tx: Arc::new(stats_tx),
            slow_after: Duration::from_secs(1),
        }
        .spawn();

        frames.send(Bytes::from_static(b"frame")).unwrap();
        drop(frames);
        worker.await.unwrap();

        assert_eq!(stats_rx.borrow().frames_decoded, 1);
        assert_eq!(stats_rx.borrow().decode_failures, 1);
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let dispatch = FrameDispatch::for_platform(Arc::new(LoggingSink::new()), Platform::Android);
        let client = StreamClient::new(Endpoint::new("127.0.0.1", 1), dispatch);
        assert!(client.phase_receiver().borrow().is_disconnected());
        assert_eq!(*client.stats_receiver().borrow(), StreamStats::default());
        assert_eq!(client.endpoint().url(), "ws://127.0.0.1:1");
    }

    #[tokio::test]
    async fn disconnect_before_first_attempt_completes() {
        let dispatch = FrameDispatch::for_platform(Arc::new(LoggingSink::new()), Platform::Android);
        // Non-routable address: the handshake would hang until the timeout.
        let handle = StreamClient::new(Endpoint::new("10.255.255.1", 9), dispatch).connect();
        let phase = handle.phase();

        tokio::time::timeout(Duration::from_secs(2), handle.disconnect())
            .await
            .expect("disconnect did not interrupt the connection attempt");
        assert!(phase.borrow().is_disconnected());
    }
}
