//! H.264 Annex-B reassembly in front of a platform decoder.
//!
//! The device splits its elementary stream into WebSocket messages without
//! regard for NAL boundaries. [`AnnexBSink`] stitches payloads back
//! together, caches the parameter sets, configures the backend once both
//! are known, and feeds every other NAL unit to the backend with a
//! synthetic 30 fps presentation clock.
//!
//! The last NAL unit of each payload stays buffered until the next start
//! code shows up, so a unit is delivered one payload late at most.

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::error::SinkError;
use crate::video::sink::FrameSink;
use crate::video::types::{DecodeRequest, FrameDimensions};

/// Upper bound for bytes held while waiting for the next start code.
pub const MAX_REASSEMBLY_BYTES: usize = 1024 * 1024;

/// Frame rate assumed when stamping presentation times.
pub const PRESENTATION_FPS: u64 = 30;

/// Units shorter than this (start code included) carry no payload.
const MIN_NAL_LEN: usize = 5;

// ── NalUnitType ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// Coded slice of a non-IDR picture (1).
    Slice,
    /// Coded slice of an IDR picture (5).
    Idr,
    /// Supplemental enhancement information (6).
    Sei,
    /// Sequence parameter set (7).
    Sps,
    /// Picture parameter set (8).
    Pps,
    /// Access unit delimiter (9).
    AccessUnitDelimiter,
    Other(u8),
}

impl NalUnitType {
    /// Classify from the NAL header byte.
    pub fn from_header(byte: u8) -> Self {
        match byte & 0x1F {
            1 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::AccessUnitDelimiter,
            n => Self::Other(n),
        }
    }

    pub fn is_parameter_set(self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

// ── NalUnit ──────────────────────────────────────────────────────

/// One NAL unit, start code included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    pub kind: NalUnitType,
    pub data: Bytes,
}

// ── NalSplitter ──────────────────────────────────────────────────

/// Incremental start-code scanner.
#[derive(Debug)]
pub struct NalSplitter {
    buf: BytesMut,
    limit: usize,
}

impl NalSplitter {
    pub fn new() -> Self {
        Self::with_limit(MAX_REASSEMBLY_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Bytes currently held back.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything held back.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append `data` and return every NAL unit that is now complete.
    ///
    /// Exceeding the limit discards everything buffered so the stream can
    /// resynchronise on the next start code.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<NalUnit>, SinkError> {
        let size = self.buf.len() + data.len();
        if size > self.limit {
            self.clear();
            return Err(SinkError::BufferOverflow {
                size,
                max: self.limit,
            });
        }
        self.buf.extend_from_slice(data);

        let mut units = Vec::new();
        loop {
            let Some((start, code_len)) = find_start_code(&self.buf, 0) else {
                // Keep a tail that could be the front half of a start code.
                let keep = self.buf.len().min(3);
                let skip = self.buf.len() - keep;
                self.buf.advance(skip);
                break;
            };
            self.buf.advance(start);

            let Some((next, _)) = find_start_code(&self.buf, code_len) else {
                break;
            };
            let unit = self.buf.split_to(next).freeze();
            if unit.len() < MIN_NAL_LEN {
                continue;
            }
            units.push(NalUnit {
                kind: NalUnitType::from_header(unit[code_len]),
                data: unit,
            });
        }
        Ok(units)
    }
}

impl Default for NalSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Position and length of the first start code at or after `from`.
fn find_start_code(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= buf.len() {
        if buf[i] == 0 && buf[i + 1] == 0 {
            if buf[i + 2] == 1 {
                return Some((i, 3));
            }
            if buf[i + 2] == 0 && i + 4 <= buf.len() && buf[i + 3] == 1 {
                return Some((i, 4));
            }
        }
        i += 1;
    }
    None
}

// ── NalDecoder ───────────────────────────────────────────────────

/// The platform decoder behind an [`AnnexBSink`].
pub trait NalDecoder: Send {
    /// Start decoding with the given parameter sets.
    fn configure(
        &mut self,
        sps: &[u8],
        pps: &[u8],
        dimensions: FrameDimensions,
    ) -> Result<(), SinkError>;

    /// Submit one NAL unit.
    fn queue(&mut self, unit: &NalUnit, presentation_us: u64) -> Result<(), SinkError>;

    /// Drop all decoder state. The next `configure` starts from scratch.
    fn reset(&mut self);
}

/// Backend that only traces what it is given. Stands in for a hardware
/// decoder on hosts that have none.
#[derive(Debug, Default)]
pub struct TracingDecoder {
    queued: u64,
}

impl TracingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> u64 {
        self.queued
    }
}

impl NalDecoder for TracingDecoder {
    fn configure(
        &mut self,
        sps: &[u8],
        pps: &[u8],
        dimensions: FrameDimensions,
    ) -> Result<(), SinkError> {
        info!(sps = sps.len(), pps = pps.len(), %dimensions, "decoder configured");
        Ok(())
    }

    fn queue(&mut self, unit: &NalUnit, presentation_us: u64) -> Result<(), SinkError> {
        self.queued += 1;
        trace!(kind = ?unit.kind, len = unit.data.len(), presentation_us, "nal unit");
        Ok(())
    }

    fn reset(&mut self) {
        debug!(queued = self.queued, "decoder reset");
        self.queued = 0;
    }
}

// ── AnnexBSink ───────────────────────────────────────────────────

struct Reassembly<D> {
    splitter: NalSplitter,
    decoder: D,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    configured: bool,
    frame_index: u64,
    dropped: u64,
}

impl<D: NalDecoder> Reassembly<D> {
    fn process(&mut self, data: &[u8], dimensions: FrameDimensions) -> Result<(), SinkError> {
        let units = self.splitter.push(data)?;
        let mut failure = None;

        for unit in units {
            match unit.kind {
                kind if kind.is_parameter_set() => {
                    if matches!(kind, NalUnitType::Sps) {
                        self.sps = Some(unit.data);
                        continue;
                    }
                    // The PPS completes the pair.
                    self.pps = Some(unit.data);
                    if !self.configured {
                        if let Err(e) = self.configure(dimensions) {
                            warn!(error = %e, "decoder configuration failed");
                            failure.get_or_insert(e);
                        }
                    }
                }
                _ if !self.configured => {
                    self.dropped += 1;
                    trace!(kind = ?unit.kind, "no parameter sets yet; dropping");
                }
                _ => {
                    let pts = self.frame_index * 1_000_000 / PRESENTATION_FPS;
                    self.frame_index += 1;
                    if let Err(e) = self.decoder.queue(&unit, pts) {
                        warn!(error = %e, "decoder rejected NAL unit; resetting");
                        self.reset();
                        failure.get_or_insert(e);
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn configure(&mut self, dimensions: FrameDimensions) -> Result<(), SinkError> {
        let (Some(sps), Some(pps)) = (&self.sps, &self.pps) else {
            return Ok(());
        };
        self.decoder.configure(sps, pps, dimensions)?;
        self.configured = true;
        Ok(())
    }

    /// Tear the backend down and bring it straight back up at the
    /// default geometry if the parameter sets are known.
    fn reset(&mut self) {
        self.decoder.reset();
        self.configured = false;
        if let Err(e) = self.configure(FrameDimensions::default()) {
            warn!(error = %e, "decoder reconfiguration failed");
        }
    }
}

/// Frame Sink that reassembles Annex-B NAL units for a [`NalDecoder`].
pub struct AnnexBSink<D> {
    inner: Mutex<Reassembly<D>>,
}

impl<D: NalDecoder> AnnexBSink<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_splitter(decoder, NalSplitter::new())
    }

    pub fn with_splitter(decoder: D, splitter: NalSplitter) -> Self {
        Self {
            inner: Mutex::new(Reassembly {
                splitter,
                decoder,
                sps: None,
                pps: None,
                configured: false,
                frame_index: 0,
                dropped: 0,
            }),
        }
    }

    /// Whether the backend has been configured with SPS and PPS.
    pub async fn is_configured(&self) -> bool {
        self.inner.lock().await.configured
    }

    /// NAL units discarded because they arrived before the parameter sets.
    pub async fn dropped_units(&self) -> u64 {
        self.inner.lock().await.dropped
    }

    /// Inspect the backend.
    pub async fn with_decoder<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.inner.lock().await.decoder)
    }
}

#[async_trait]
impl<D: NalDecoder + 'static> FrameSink for AnnexBSink<D> {
    async fn decode(&self, request: DecodeRequest) -> Result<(), SinkError> {
        let dimensions = request.dimensions().unwrap_or_default();
        self.inner.lock().await.process(request.data(), dimensions)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0, 0, 0, 1, 0x67, 0x42, 0xC0, 0x1E];
    const PPS: &[u8] = &[0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80];
    const IDR: &[u8] = &[0, 0, 0, 1, 0x65, 0x88, 0x84, 0x00, 0x33];
    const SLICE: &[u8] = &[0, 0, 1, 0x41, 0x9A, 0x02, 0x04];

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Configure(FrameDimensions),
        Queue(NalUnitType, u64),
        Reset,
    }

    #[derive(Default)]
    struct MockDecoder {
        events: Vec<Event>,
        fail_queue: bool,
    }

    impl NalDecoder for MockDecoder {
        fn configure(
            &mut self,
            sps: &[u8],
            pps: &[u8],
            dimensions: FrameDimensions,
        ) -> Result<(), SinkError> {
            assert_eq!(sps, SPS);
            assert_eq!(pps, PPS);
            self.events.push(Event::Configure(dimensions));
            Ok(())
        }

        fn queue(&mut self, unit: &NalUnit, presentation_us: u64) -> Result<(), SinkError> {
            if self.fail_queue {
                self.fail_queue = false;
                return Err(SinkError::Backend("input buffer unavailable".into()));
            }
            self.events.push(Event::Queue(unit.kind, presentation_us));
            Ok(())
        }

        fn reset(&mut self) {
            self.events.push(Event::Reset);
        }
    }

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    fn sized(data: Vec<u8>) -> DecodeRequest {
        DecodeRequest::Sized {
            data: Bytes::from(data),
            dimensions: FrameDimensions::default(),
        }
    }

    #[test]
    fn splits_three_and_four_byte_start_codes() {
        let mut splitter = NalSplitter::new();
        let units = splitter.push(&concat(&[SPS, SLICE, PPS])).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].kind, NalUnitType::Sps);
        assert_eq!(units[0].data.as_ref(), SPS);
        assert_eq!(units[1].kind, NalUnitType::Slice);
        assert_eq!(units[1].data.as_ref(), SLICE);
        // PPS waits for the next start code.
        assert_eq!(splitter.buffered(), PPS.len());
    }

    #[test]
    fn start_code_straddling_payloads() {
        let mut splitter = NalSplitter::new();
        let stream = concat(&[IDR, SLICE]);
        // Cut inside the second unit's start code.
        let cut = IDR.len() + 1;

        assert!(splitter.push(&stream[..cut]).unwrap().is_empty());
        let units = splitter.push(&stream[cut..]).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, NalUnitType::Idr);
        assert_eq!(units[0].data.as_ref(), IDR);
    }

    #[test]
    fn leading_garbage_is_discarded() {
        let mut splitter = NalSplitter::new();
        let units = splitter
            .push(&concat(&[&[0xAB, 0xCD, 0xEF], SPS, PPS]))
            .unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].data.as_ref(), SPS);
    }

    #[test]
    fn garbage_without_start_code_keeps_short_tail() {
        let mut splitter = NalSplitter::new();
        assert!(splitter.push(&[7u8; 100]).unwrap().is_empty());
        assert_eq!(splitter.buffered(), 3);
    }

    #[test]
    fn short_units_are_skipped() {
        let mut splitter = NalSplitter::new();
        let units = splitter
            .push(&concat(&[&[0, 0, 1, 0x09], SLICE, SLICE]))
            .unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, NalUnitType::Slice);
    }

    #[test]
    fn overflow_clears_buffer() {
        let mut splitter = NalSplitter::with_limit(16);
        splitter.push(SPS).unwrap();
        let err = splitter.push(&[1u8; 12]).unwrap_err();
        assert!(matches!(err, SinkError::BufferOverflow { size: 20, max: 16 }));
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn header_classification() {
        assert_eq!(NalUnitType::from_header(0x67), NalUnitType::Sps);
        assert_eq!(NalUnitType::from_header(0x68), NalUnitType::Pps);
        assert_eq!(NalUnitType::from_header(0x65), NalUnitType::Idr);
        assert_eq!(NalUnitType::from_header(0x41), NalUnitType::Slice);
        assert_eq!(NalUnitType::from_header(0x06), NalUnitType::Sei);
        assert_eq!(NalUnitType::from_header(0x0C), NalUnitType::Other(12));
        assert!(NalUnitType::Sps.is_parameter_set());
        assert!(!NalUnitType::Idr.is_parameter_set());
    }

    #[tokio::test]
    async fn configures_after_parameter_sets_and_stamps_frames() {
        let sink = AnnexBSink::new(MockDecoder::default());

        sink.decode(sized(concat(&[SPS, PPS, IDR]))).await.unwrap();
        assert!(sink.is_configured().await);

        sink.decode(sized(concat(&[SLICE, SLICE]))).await.unwrap();

        let events = sink.with_decoder(|d| d.events.clone()).await;
        assert_eq!(
            events,
            vec![
                Event::Configure(FrameDimensions::default()),
                Event::Queue(NalUnitType::Idr, 0),
                Event::Queue(NalUnitType::Slice, 33_333),
            ]
        );
    }

    #[tokio::test]
    async fn inferred_requests_configure_at_default_size() {
        let sink = AnnexBSink::new(MockDecoder::default());
        sink.decode(DecodeRequest::Inferred {
            data: Bytes::from(concat(&[SPS, PPS, IDR])),
        })
        .await
        .unwrap();

        let events = sink.with_decoder(|d| d.events.clone()).await;
        assert_eq!(events, vec![Event::Configure(FrameDimensions::new(640, 368))]);
    }

    #[tokio::test]
    async fn units_before_configuration_are_dropped() {
        let sink = AnnexBSink::new(MockDecoder::default());
        sink.decode(sized(concat(&[SLICE, IDR, SPS, PPS, SLICE]))).await.unwrap();

        assert_eq!(sink.dropped_units().await, 2);
        assert!(sink.is_configured().await);
        let events = sink.with_decoder(|d| d.events.clone()).await;
        assert_eq!(events, vec![Event::Configure(FrameDimensions::default())]);
    }

    #[tokio::test]
    async fn backend_error_resets_and_reconfigures() {
        let decoder = MockDecoder {
            fail_queue: true,
            ..Default::default()
        };
        let sink = AnnexBSink::new(decoder);

        let err = sink
            .decode(sized(concat(&[SPS, PPS, IDR, SLICE])))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Backend(_)));
        assert!(sink.is_configured().await);

        let events = sink.with_decoder(|d| d.events.clone()).await;
        assert_eq!(
            events,
            vec![
                Event::Configure(FrameDimensions::default()),
                Event::Reset,
                Event::Configure(FrameDimensions::default()),
            ]
        );
    }

    #[tokio::test]
    async fn tracing_decoder_counts_queued_units() {
        let sink = AnnexBSink::new(TracingDecoder::new());
        sink.decode(sized(concat(&[SPS, PPS, IDR, SLICE, SLICE]))).await.unwrap();
        assert_eq!(sink.with_decoder(|d| d.queued()).await, 2);
    }
}
