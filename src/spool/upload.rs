//! Upload spool: bridges a strictly sequential write stream into a
//! fixed-minimum-part-size multipart upload.
//!
//! Bytes accumulate in a local buffer file; once the buffer reaches the
//! minimum part size it is flushed as one part and truncated, bounding
//! local disk use to roughly one part regardless of object size. Part
//! numbers are assigned at flush time, 1-based, contiguous and never
//! reused. A failed flush is not retried; it is fatal to this upload only.

use crate::error::{GatewayError, Result};
use crate::store::{CompletedPart, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Object storage refuses non-final parts below this size.
pub const MIN_PART_SIZE: u64 = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoolState {
    Uninitiated,
    Open,
    Closed,
}

impl SpoolState {
    fn name(self) -> &'static str {
        match self {
            SpoolState::Uninitiated => "uninitiated",
            SpoolState::Open => "open",
            SpoolState::Closed => "closed",
        }
    }
}

pub struct UploadSpool {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    buffer_path: PathBuf,
    state: SpoolState,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    uploaded_len: u64,
    buffered_len: u64,
    location: Option<String>,
}

impl UploadSpool {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        buffer_path: PathBuf,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            key: key.into(),
            buffer_path,
            state: SpoolState::Uninitiated,
            upload_id: None,
            parts: Vec::new(),
            uploaded_len: 0,
            buffered_len: 0,
            location: None,
        }
    }

    fn expect_state(&self, expected: SpoolState) -> Result<()> {
        if self.state != expected {
            return Err(GatewayError::InvalidUploadState {
                expected: expected.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    /// Uninitiated → Open: create the buffer file and request an upload id.
    pub async fn open(&mut self) -> Result<()> {
        self.expect_state(SpoolState::Uninitiated)?;
        if let Some(dir) = self.buffer_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::File::create(&self.buffer_path).await?;
        let upload_id = self
            .store
            .create_multipart_upload(&self.bucket, &self.key)
            .await?;
        tracing::debug!(key = %self.key, upload_id = %upload_id, "multipart upload opened");
        self.upload_id = Some(upload_id);
        self.state = SpoolState::Open;
        Ok(())
    }

    /// Append to the buffer; crossing the minimum part size flushes one
    /// part before returning. The await is the backpressure: the caller
    /// cannot push more bytes until the part is uploaded.
    pub async fn append(&mut self, data: &[u8]) -> Result<()> {
        self.expect_state(SpoolState::Open)?;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.buffer_path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        self.buffered_len += data.len() as u64;
        if self.buffered_len >= MIN_PART_SIZE {
            self.flush_part().await?;
        }
        Ok(())
    }

    /// Open → Closed: flush any residual bytes unconditionally (the final
    /// part is exempt from the minimum), complete the upload and release
    /// the local buffer.
    pub async fn close(&mut self) -> Result<String> {
        self.expect_state(SpoolState::Open)?;
        if self.buffered_len > 0 {
            self.flush_part().await?;
        }
        let upload_id = self.upload_id.as_deref().unwrap_or_default().to_string();
        let location = self
            .store
            .complete_multipart_upload(&self.bucket, &self.key, &upload_id, &self.parts)
            .await?;
        let location = percent_decode(&location);
        tracing::info!(
            key = %self.key,
            parts = self.parts.len(),
            bytes = self.uploaded_len,
            "multipart upload completed"
        );
        self.location = Some(location.clone());
        self.state = SpoolState::Closed;
        self.release_local().await?;
        Ok(location)
    }

    async fn flush_part(&mut self) -> Result<()> {
        let part_number = self.parts.len() as i32 + 1;
        let body = tokio::fs::read(&self.buffer_path).await?;
        let upload_id = self.upload_id.as_deref().unwrap_or_default().to_string();
        let e_tag = self
            .store
            .upload_part(&self.bucket, &self.key, &upload_id, part_number, body)
            .await?;
        self.parts.push(CompletedPart { part_number, e_tag });
        self.uploaded_len += self.buffered_len;
        self.buffered_len = 0;
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.buffer_path)
            .await?;
        file.set_len(0).await?;
        Ok(())
    }

    /// Delete the local buffer. The file transitions to deleted exactly
    /// once; a second attempt fails with the on-disk miss.
    pub async fn release_local(&mut self) -> Result<()> {
        match tokio::fs::remove_file(&self.buffer_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                GatewayError::MissingTemporaryFileOnDisk(self.key.clone()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub fn state(&self) -> SpoolState {
        self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn buffer_path(&self) -> &PathBuf {
        &self.buffer_path
    }

    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn uploaded_len(&self) -> u64 {
        self.uploaded_len
    }

    pub fn buffered_len(&self) -> u64 {
        self.buffered_len
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

/// Minimal %XX decoding for the object locator returned by completion.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            let hex = &input[i + 1..i + 3];
            if let Ok(b) = u8::from_str_radix(hex, 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
