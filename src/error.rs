//! Unified error surface for the gateway core.
//!
//! Resolution errors, spool lifecycle errors and collaborator failures all
//! funnel through this enum; the protocol engine maps them to status codes
//! and nothing richer ever crosses the protocol boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation not valid for path: {0}")]
    InvalidOperationForPath(String),

    #[error("record {0} has no Original derivative")]
    MissingOriginalFile(i64),

    #[error("record {0} has an Original derivative without content")]
    IncompleteOriginalFile(i64),

    #[error("no upload spool registered for {0}")]
    MissingTemporaryFileInMemory(String),

    #[error("upload spool backing file for {0} is gone")]
    MissingTemporaryFileOnDisk(String),

    #[error("upload spool is {actual}, expected {expected}")]
    InvalidUploadState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("archive path segment has no parenthesized id: {0}")]
    MissingArchiveId(String),

    #[error("missing upload destination setting: {0}")]
    SystemConfiguration(&'static str),

    #[error("remote api error: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
