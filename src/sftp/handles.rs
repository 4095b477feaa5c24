//! Per-session handle table for open directories and files.

use crate::sftp::message::HandleId;
use crate::spool::registry::SharedSpool;
use crate::vfs::codec::DirEntry;
use crate::vfs::fs::OriginalContent;
use bytes::Bytes;
use std::collections::HashMap;

/// A directory handle holds its full pre-fetched listing; one READDIR
/// drains it and flips `consumed`, after which only EOF comes back.
pub struct DirHandle {
    pub path: String,
    pub entries: Vec<DirEntry>,
    pub consumed: bool,
}

impl DirHandle {
    pub fn new(path: impl Into<String>, entries: Vec<DirEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
            consumed: false,
        }
    }
}

pub struct ReadHandle {
    pub path: String,
    pub content: OriginalContent,
    /// Fetched once on first READ, sliced afterwards.
    pub cached: Option<Bytes>,
}

pub struct WriteHandle {
    pub path: String,
    pub spool: SharedSpool,
}

pub enum FileHandle {
    Read(ReadHandle),
    Write(WriteHandle),
}

/// Everything a session-scoped id can name. One table holds all of these,
/// so an id identifies exactly one handle regardless of kind.
pub enum SessionHandle {
    Dir(DirHandle),
    File(FileHandle),
}

/// Session-scoped id allocator + map. Ids are never reused within a
/// session, so a stale id cannot silently alias a newer handle.
pub struct HandleTable<H> {
    next: HandleId,
    handles: HashMap<HandleId, H>,
}

impl<H> HandleTable<H> {
    pub fn new() -> Self {
        Self {
            next: 1,
            handles: HashMap::new(),
        }
    }

    pub fn insert(&mut self, handle: H) -> HandleId {
        let id = self.next;
        self.next += 1;
        self.handles.insert(id, handle);
        id
    }

    pub fn get(&self, id: HandleId) -> Option<&H> {
        self.handles.get(&id)
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut H> {
        self.handles.get_mut(&id)
    }

    pub fn remove(&mut self, id: HandleId) -> Option<H> {
        self.handles.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<H> Default for HandleTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
