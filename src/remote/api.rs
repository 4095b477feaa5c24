//! Read-only archive API client.
//!
//! Entity shapes mirror the remote service: archives hold folders, folders
//! hold child folders and records, records hold derivative files of which
//! at most one is tagged `Original`. `Folder` and `Record` come back
//! unpopulated from listing calls; `get_folder`/`get_record` return the
//! populated variants.

use crate::error::{GatewayError, Result};
use crate::remote::auth::TokenProvider;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub const ORIGINAL_DERIVATIVE: &str = "Original";

#[derive(Debug, Clone, Deserialize)]
pub struct Archive {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub files: Vec<DerivativeFile>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivativeFile {
    pub derivative: String,
    #[serde(default)]
    pub size: u64,
    /// Content locator; empty while the remote side is still processing.
    #[serde(default)]
    pub url: String,
}

impl Record {
    /// The canonical untransformed derivative, when the record has one.
    pub fn original(&self) -> Option<&DerivativeFile> {
        self.files.iter().find(|f| f.derivative == ORIGINAL_DERIVATIVE)
    }
}

#[async_trait]
pub trait ArchiveApi: Send + Sync {
    async fn list_archives(&self) -> Result<Vec<Archive>>;
    async fn list_archive_folders(&self, archive_id: i64) -> Result<Vec<Folder>>;
    async fn get_folder(&self, folder_id: i64, archive_id: i64) -> Result<Folder>;
    async fn get_record(&self, record_id: i64, archive_id: i64) -> Result<Record>;
}

/// Fetches the bytes behind a derivative's content locator.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// HTTP client against the real archive service. Every call carries a
/// freshly obtained bearer token; failures propagate opaquely.
pub struct HttpArchiveApi {
    base_url: String,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpArchiveApi {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            tokens,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T> {
        let token = self.tokens.valid_token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ArchiveApi for HttpArchiveApi {
    async fn list_archives(&self) -> Result<Vec<Archive>> {
        self.get_json(format!("{}/api/archives", self.base_url)).await
    }

    async fn list_archive_folders(&self, archive_id: i64) -> Result<Vec<Folder>> {
        self.get_json(format!("{}/api/archives/{archive_id}/folders", self.base_url))
            .await
    }

    async fn get_folder(&self, folder_id: i64, archive_id: i64) -> Result<Folder> {
        self.get_json(format!(
            "{}/api/folders/{folder_id}?archiveId={archive_id}",
            self.base_url
        ))
        .await
    }

    async fn get_record(&self, record_id: i64, archive_id: i64) -> Result<Record> {
        self.get_json(format!(
            "{}/api/records/{record_id}?archiveId={archive_id}",
            self.base_url
        ))
        .await
    }
}

#[async_trait]
impl ContentFetcher for HttpArchiveApi {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let token = self.tokens.valid_token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.bytes().await?)
    }
}

/// In-memory archive fixture backing the demo binary and the resolution
/// tests. Listing calls return unpopulated nodes the way the remote
/// service does; `get_folder`/`get_record` return populated ones.
#[derive(Default)]
pub struct InMemoryArchiveApi {
    pub archives: Vec<Archive>,
    /// archive id -> top-level folders (populated)
    pub top_folders: std::collections::HashMap<i64, Vec<Folder>>,
    /// folder id -> populated folder
    pub folders: std::collections::HashMap<i64, Folder>,
    /// record id -> populated record
    pub records: std::collections::HashMap<i64, Record>,
    pub calls: std::sync::atomic::AtomicU64,
}

impl InMemoryArchiveApi {
    pub fn call_count(&self) -> u64 {
        self.calls.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn strip(folder: &Folder) -> Folder {
        Folder {
            id: folder.id,
            name: folder.name.clone(),
            folders: Vec::new(),
            records: Vec::new(),
            updated_at: folder.updated_at,
        }
    }
}

#[async_trait]
impl ArchiveApi for InMemoryArchiveApi {
    async fn list_archives(&self) -> Result<Vec<Archive>> {
        self.tick();
        Ok(self.archives.clone())
    }

    async fn list_archive_folders(&self, archive_id: i64) -> Result<Vec<Folder>> {
        self.tick();
        self.top_folders
            .get(&archive_id)
            .map(|fs| fs.iter().map(Self::strip).collect())
            .ok_or_else(|| GatewayError::NotFound(format!("archive {archive_id}")))
    }

    async fn get_folder(&self, folder_id: i64, _archive_id: i64) -> Result<Folder> {
        self.tick();
        self.folders
            .get(&folder_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("folder {folder_id}")))
    }

    async fn get_record(&self, record_id: i64, _archive_id: i64) -> Result<Record> {
        self.tick();
        self.records
            .get(&record_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("record {record_id}")))
    }
}
