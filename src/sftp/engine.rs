//! Per-session protocol engine.
//!
//! Owns the session handle table and turns every inbound
//! request into exactly one terminal response. Resolution errors become
//! status codes here; nothing internal crosses the boundary and no path
//! leaves a request unanswered.

use crate::error::{GatewayError, Result};
use crate::sftp::handles::{
    DirHandle, FileHandle, HandleTable, ReadHandle, SessionHandle, WriteHandle,
};
use crate::sftp::message::{Request, RequestId, Response};
use crate::spool::registry::TemporaryFileRegistry;
use crate::vfs::codec;
use crate::vfs::fs::VirtualFileSystem;
use crate::vfs::path::{self, PathKind};
use crate::remote::api::ContentFetcher;
use std::sync::Arc;

pub struct ProtocolEngine {
    fs: Arc<VirtualFileSystem>,
    spools: Arc<TemporaryFileRegistry>,
    fetcher: Arc<dyn ContentFetcher>,
    key_prefix: String,
    handles: HandleTable<SessionHandle>,
}

impl ProtocolEngine {
    pub fn new(
        fs: Arc<VirtualFileSystem>,
        spools: Arc<TemporaryFileRegistry>,
        fetcher: Arc<dyn ContentFetcher>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            spools,
            fetcher,
            key_prefix: key_prefix.into(),
            handles: HandleTable::new(),
        }
    }

    /// Dispatch one request to one response.
    pub async fn handle(&mut self, request: Request) -> Response {
        let id = request.id();
        let result = match request {
            Request::OpenDir { path, .. } => self.open_dir(id, &path).await,
            Request::ReadDir { handle, .. } => Ok(self.read_dir(id, handle)),
            Request::Close { handle, .. } => self.close(id, handle).await,
            Request::Open { path, write, .. } => self.open(id, &path, write).await,
            Request::Read {
                handle, offset, len, ..
            } => self.read(id, handle, offset, len).await,
            Request::Write {
                handle, offset, data, ..
            } => self.write(id, handle, offset, &data).await,
            Request::Stat { path, .. } | Request::Lstat { path, .. } => self.stat(id, &path).await,
            Request::Fstat { handle, .. } => self.fstat(id, handle).await,
            Request::RealPath { path, .. } => Ok(self.real_path(id, &path)),
            // Acknowledged, never mutated: these are unimplemented
            // upstream and must say so instead of guessing.
            Request::SetStat { .. }
            | Request::FSetStat { .. }
            | Request::Remove { .. }
            | Request::Rmdir { .. }
            | Request::Mkdir { .. }
            | Request::Rename { .. }
            | Request::Symlink { .. }
            | Request::ReadLink { .. } => Ok(Response::unsupported(id)),
        };
        match result {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(request = id, error = %error, "request failed");
                Response::from_error(id, &error)
            }
        }
    }

    async fn open_dir(&mut self, id: RequestId, dir_path: &str) -> Result<Response> {
        // One logical fetch up front; a failure here never leaves a
        // partial handle behind.
        let entries = self.fs.list_directory(dir_path).await?;
        let handle = self
            .handles
            .insert(SessionHandle::Dir(DirHandle::new(dir_path, entries)));
        Ok(Response::Handle { id, handle })
    }

    fn read_dir(&mut self, id: RequestId, handle: u64) -> Response {
        let Some(SessionHandle::Dir(dir)) = self.handles.get_mut(handle) else {
            return Response::failure(id, "unknown directory handle");
        };
        if dir.consumed {
            return Response::eof(id);
        }
        dir.consumed = true;
        // No pagination: the whole listing goes out in one batch.
        Response::Name {
            id,
            entries: std::mem::take(&mut dir.entries),
        }
    }

    async fn close(&mut self, id: RequestId, handle: u64) -> Result<Response> {
        match self.handles.remove(handle) {
            Some(SessionHandle::Dir(dir)) => {
                tracing::debug!(path = %dir.path, "directory handle closed");
                Ok(Response::ok(id))
            }
            Some(SessionHandle::File(FileHandle::Write(write))) => {
                let location = write.spool.lock().await.close().await;
                self.spools.forget(&write.path);
                let location = location?;
                tracing::info!(path = %write.path, %location, "upload finalized");
                Ok(Response::ok(id))
            }
            Some(SessionHandle::File(FileHandle::Read(_))) => Ok(Response::ok(id)),
            // Closing an unknown or already-closed handle still succeeds.
            None => Ok(Response::ok(id)),
        }
    }

    async fn open(&mut self, id: RequestId, file_path: &str, write: bool) -> Result<Response> {
        let handle = if write {
            let key = self.object_key(file_path)?;
            let spool = self.spools.open(file_path, &key).await?;
            self.handles
                .insert(SessionHandle::File(FileHandle::Write(WriteHandle {
                    path: file_path.to_string(),
                    spool,
                })))
        } else {
            let content = self.fs.load_file(file_path).await?;
            self.handles
                .insert(SessionHandle::File(FileHandle::Read(ReadHandle {
                    path: file_path.to_string(),
                    content,
                    cached: None,
                })))
        };
        Ok(Response::Handle { id, handle })
    }

    async fn read(&mut self, id: RequestId, handle: u64, offset: u64, len: u32) -> Result<Response> {
        let fetcher = self.fetcher.clone();
        let Some(SessionHandle::File(file)) = self.handles.get_mut(handle) else {
            return Ok(Response::failure(id, "unknown file handle"));
        };
        let FileHandle::Read(read) = file else {
            return Ok(Response::failure(id, "handle not open for reading"));
        };
        if read.cached.is_none() {
            tracing::debug!(path = %read.path, url = %read.content.url, "fetching original content");
            read.cached = Some(fetcher.fetch(&read.content.url).await?);
        }
        let Some(data) = read.cached.as_ref() else {
            return Ok(Response::failure(id, "content unavailable"));
        };
        let start = offset as usize;
        if start >= data.len() {
            return Ok(Response::eof(id));
        }
        let end = (start + len as usize).min(data.len());
        Ok(Response::Data {
            id,
            data: data.slice(start..end),
        })
    }

    /// Offset is deliberately ignored: writes are strictly sequential
    /// appends into the spool.
    async fn write(&mut self, id: RequestId, handle: u64, _offset: u64, data: &[u8]) -> Result<Response> {
        let Some(SessionHandle::File(FileHandle::Write(write))) = self.handles.get(handle) else {
            return Ok(Response::failure(id, "handle not open for writing"));
        };
        let spool_path = write.path.clone();
        // Refresh the registry timer and surface on-disk loss before
        // appending; the append itself awaits any threshold flush.
        let spool = self.spools.get(&spool_path).await?;
        spool.lock().await.append(data).await?;
        Ok(Response::ok(id))
    }

    async fn stat(&self, id: RequestId, stat_path: &str) -> Result<Response> {
        let attrs = self.fs.stat(stat_path).await?;
        Ok(Response::Attrs { id, attrs })
    }

    async fn fstat(&self, id: RequestId, handle: u64) -> Result<Response> {
        match self.handles.get(handle) {
            Some(SessionHandle::File(FileHandle::Read(read))) => Ok(Response::Attrs {
                id,
                attrs: codec::file_attrs(read.content.size, 0),
            }),
            Some(SessionHandle::File(FileHandle::Write(write))) => {
                let spool = write.spool.lock().await;
                let size = spool.uploaded_len() + spool.buffered_len();
                Ok(Response::Attrs {
                    id,
                    attrs: codec::file_attrs(size, 0),
                })
            }
            _ => Ok(Response::failure(id, "unknown file handle")),
        }
    }

    /// Canonicalizes against the virtual root and synthesizes attributes
    /// from classification alone, without verifying existence.
    fn real_path(&self, id: RequestId, raw: &str) -> Response {
        let canonical = path::canonicalize(raw);
        let attrs = match path::classify(&canonical) {
            PathKind::Item => codec::file_attrs(0, 0),
            _ => codec::dir_attrs(0),
        };
        Response::Name {
            id,
            entries: vec![codec::entry(canonical, attrs)],
        }
    }

    /// Object key for an upload: `<prefix>/<archive id>/<path under the
    /// archive>`.
    fn object_key(&self, file_path: &str) -> Result<String> {
        let canonical = path::canonicalize(file_path);
        let slug = path::archive_slug(&canonical)?;
        let segs = path::segments(&canonical);
        if segs.len() < 3 {
            return Err(GatewayError::InvalidOperationForPath(canonical));
        }
        let rest = segs[2..].join("/");
        if self.key_prefix.is_empty() {
            Ok(format!("{slug}/{rest}"))
        } else {
            Ok(format!("{}/{slug}/{rest}", self.key_prefix))
        }
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }
}
