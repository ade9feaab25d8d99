//! Sink that appends the raw elementary stream to a file.
//!
//! The CV200 sends Annex-B H.264, so the resulting file plays directly
//! in `ffplay -f h264`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::SinkError;
use crate::video::sink::FrameSink;
use crate::video::types::DecodeRequest;

pub struct RecordingSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl RecordingSink {
    /// Create (or truncate) the output file.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        info!(path = %path.display(), "recording frames");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn decode(&self, request: DecodeRequest) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.write_all(request.data()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn appends_payloads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.h264");
        let sink = RecordingSink::create(&path).await.unwrap();

        sink.decode(DecodeRequest::Inferred {
            data: Bytes::from_static(&[0, 0, 0, 1, 0x67]),
        })
        .await
        .unwrap();
        sink.decode(DecodeRequest::Inferred {
            data: Bytes::from_static(&[0, 0, 1, 0x68]),
        })
        .await
        .unwrap();

        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, vec![0, 0, 0, 1, 0x67, 0, 0, 1, 0x68]);
        assert_eq!(sink.path(), path.as_path());
    }

    #[tokio::test]
    async fn create_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("feed.h264");
        assert!(matches!(
            RecordingSink::create(&path).await,
            Err(SinkError::Io(_))
        ));
    }
}
