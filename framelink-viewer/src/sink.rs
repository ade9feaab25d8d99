//! Sink selection from configuration.

use std::sync::Arc;

use framelink_core::{
    AnnexBSink, FrameDispatch, FrameSink, LoggingSink, RecordingSink, SinkError, TracingDecoder,
};

use crate::config::{SinkKind, VideoConfig};

/// Build the sink named by `video.sink`.
pub async fn build_sink(video: &VideoConfig) -> Result<Arc<dyn FrameSink>, SinkError> {
    let sink: Arc<dyn FrameSink> = match video.sink {
        SinkKind::Annexb => Arc::new(AnnexBSink::new(TracingDecoder::new())),
        SinkKind::Log => Arc::new(LoggingSink::new()),
        SinkKind::Record => Arc::new(RecordingSink::create(&video.record_path).await?),
    };
    Ok(sink)
}

/// Build the dispatcher for the configured platform and geometry.
pub async fn build_dispatch(video: &VideoConfig) -> Result<FrameDispatch, SinkError> {
    let sink = build_sink(video).await?;
    Ok(FrameDispatch::for_platform(sink, video.platform()).with_dimensions(video.dimensions()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_core::{CallingConvention, FrameDimensions, Platform};

    #[tokio::test]
    async fn dispatch_follows_platform_override() {
        let video = VideoConfig {
            platform: Some(Platform::Ios),
            sink: SinkKind::Log,
            ..Default::default()
        };
        let dispatch = build_dispatch(&video).await.unwrap();
        assert_eq!(dispatch.convention(), CallingConvention::Inferred);
    }

    #[tokio::test]
    async fn dispatch_uses_configured_dimensions() {
        let video = VideoConfig {
            platform: Some(Platform::Android),
            width: 1280,
            height: 720,
            ..Default::default()
        };
        let dispatch = build_dispatch(&video).await.unwrap();
        assert_eq!(dispatch.convention(), CallingConvention::ExplicitDimensions);
        assert_eq!(dispatch.dimensions(), FrameDimensions::new(1280, 720));
    }

    #[tokio::test]
    async fn record_sink_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.h264");
        let video = VideoConfig {
            sink: SinkKind::Record,
            record_path: path.clone(),
            ..Default::default()
        };
        build_sink(&video).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn record_sink_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let video = VideoConfig {
            sink: SinkKind::Record,
            record_path: dir.path().join("missing/feed.h264"),
            ..Default::default()
        };
        assert!(build_sink(&video).await.is_err());
    }
}
