//! Object-storage adapter: the three multipart-upload calls the spool
//! layer needs, plus an in-memory implementation for tests and the demo.

pub mod s3;

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub e_tag: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String>;

    /// Finalize the upload from its ordered part list; returns the
    /// resulting object location.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<String>;
}

#[derive(Default)]
struct InMemoryUpload {
    key: String,
    parts: Vec<(i32, Vec<u8>)>,
}

/// In-memory multipart store for local development and tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    uploads: Mutex<HashMap<String, InMemoryUpload>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    next_upload: Mutex<u64>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed object bytes, if the key was finalized.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Sizes of the parts uploaded so far for an in-flight upload.
    pub fn part_sizes(&self, upload_id: &str) -> Vec<usize> {
        self.uploads
            .lock()
            .unwrap()
            .get(upload_id)
            .map(|u| u.parts.iter().map(|(_, body)| body.len()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_multipart_upload(&self, _bucket: &str, key: &str) -> Result<String> {
        let mut next = self.next_upload.lock().unwrap();
        *next += 1;
        let upload_id = format!("upload-{}", *next);
        self.uploads.lock().unwrap().insert(
            upload_id.clone(),
            InMemoryUpload {
                key: key.to_string(),
                parts: Vec::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| GatewayError::Storage(format!("unknown upload {upload_id}")))?;
        upload.parts.push((part_number, body));
        Ok(format!("etag-{part_number}"))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<String> {
        let upload = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| GatewayError::Storage(format!("unknown upload {upload_id}")))?;
        let mut expected = 1;
        for part in parts {
            if part.part_number != expected {
                return Err(GatewayError::Storage(format!(
                    "non-contiguous part list at {}",
                    part.part_number
                )));
            }
            expected += 1;
        }
        let mut body = Vec::new();
        for (_, chunk) in &upload.parts {
            body.extend_from_slice(chunk);
        }
        self.objects.lock().unwrap().insert(upload.key, body);
        Ok(format!("https://{bucket}.example/{key}"))
    }
}
