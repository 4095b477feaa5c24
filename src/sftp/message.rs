//! Protocol request/response surface.
//!
//! The secure channel and wire framing live in the surrounding protocol
//! library; this layer sees already-classified requests and must answer
//! each one with exactly one terminal response echoing its correlation id.

use crate::error::GatewayError;
use crate::vfs::codec::{DirEntry, FileAttrs};
use bytes::Bytes;

pub type RequestId = u32;
pub type HandleId = u64;

#[derive(Debug, Clone)]
pub enum Request {
    Open {
        id: RequestId,
        path: String,
        write: bool,
    },
    Read {
        id: RequestId,
        handle: HandleId,
        offset: u64,
        len: u32,
    },
    Write {
        id: RequestId,
        handle: HandleId,
        offset: u64,
        data: Bytes,
    },
    Close {
        id: RequestId,
        handle: HandleId,
    },
    OpenDir {
        id: RequestId,
        path: String,
    },
    ReadDir {
        id: RequestId,
        handle: HandleId,
    },
    Stat {
        id: RequestId,
        path: String,
    },
    Lstat {
        id: RequestId,
        path: String,
    },
    Fstat {
        id: RequestId,
        handle: HandleId,
    },
    RealPath {
        id: RequestId,
        path: String,
    },
    SetStat {
        id: RequestId,
        path: String,
    },
    FSetStat {
        id: RequestId,
        handle: HandleId,
    },
    Remove {
        id: RequestId,
        path: String,
    },
    Rmdir {
        id: RequestId,
        path: String,
    },
    Mkdir {
        id: RequestId,
        path: String,
    },
    Rename {
        id: RequestId,
        from: String,
        to: String,
    },
    Symlink {
        id: RequestId,
        target: String,
        link: String,
    },
    ReadLink {
        id: RequestId,
        path: String,
    },
}

impl Request {
    pub fn id(&self) -> RequestId {
        match self {
            Request::Open { id, .. }
            | Request::Read { id, .. }
            | Request::Write { id, .. }
            | Request::Close { id, .. }
            | Request::OpenDir { id, .. }
            | Request::ReadDir { id, .. }
            | Request::Stat { id, .. }
            | Request::Lstat { id, .. }
            | Request::Fstat { id, .. }
            | Request::RealPath { id, .. }
            | Request::SetStat { id, .. }
            | Request::FSetStat { id, .. }
            | Request::Remove { id, .. }
            | Request::Rmdir { id, .. }
            | Request::Mkdir { id, .. }
            | Request::Rename { id, .. }
            | Request::Symlink { id, .. }
            | Request::ReadLink { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Eof,
    NoSuchFile,
    Failure,
    OpUnsupported,
}

#[derive(Debug, Clone)]
pub enum Response {
    Status {
        id: RequestId,
        status: Status,
        message: String,
    },
    Handle {
        id: RequestId,
        handle: HandleId,
    },
    Data {
        id: RequestId,
        data: Bytes,
    },
    Name {
        id: RequestId,
        entries: Vec<DirEntry>,
    },
    Attrs {
        id: RequestId,
        attrs: FileAttrs,
    },
}

impl Response {
    pub fn id(&self) -> RequestId {
        match self {
            Response::Status { id, .. }
            | Response::Handle { id, .. }
            | Response::Data { id, .. }
            | Response::Name { id, .. }
            | Response::Attrs { id, .. } => *id,
        }
    }

    pub fn ok(id: RequestId) -> Self {
        Response::Status {
            id,
            status: Status::Ok,
            message: String::new(),
        }
    }

    pub fn eof(id: RequestId) -> Self {
        Response::Status {
            id,
            status: Status::Eof,
            message: String::new(),
        }
    }

    pub fn unsupported(id: RequestId) -> Self {
        Response::Status {
            id,
            status: Status::OpUnsupported,
            message: "operation not supported".into(),
        }
    }

    pub fn failure(id: RequestId, message: impl Into<String>) -> Self {
        Response::Status {
            id,
            status: Status::Failure,
            message: message.into(),
        }
    }

    /// Map an internal error to a terminal status. Detail stays in logs;
    /// clients see only the status code.
    pub fn from_error(id: RequestId, error: &GatewayError) -> Self {
        let status = match error {
            GatewayError::NotFound(_)
            | GatewayError::MissingOriginalFile(_)
            | GatewayError::IncompleteOriginalFile(_) => Status::NoSuchFile,
            _ => Status::Failure,
        };
        Response::Status {
            id,
            status,
            message: match status {
                Status::NoSuchFile => "no such file".into(),
                _ => "failure".into(),
            },
        }
    }

    pub fn status(&self) -> Option<Status> {
        match self {
            Response::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
