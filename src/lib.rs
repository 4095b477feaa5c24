//! gatefs: exposes a remote hierarchical archive store as a virtual
//! filesystem behind an SFTP-style request surface.
//!
//! Reads resolve lazily against the archive API through per-user caches;
//! writes stream through local spools into multipart object-storage
//! uploads. The secure transport and the login workflow live outside
//! this crate.

pub mod clock;
pub mod config;
pub mod error;
pub mod registry;
pub mod remote;
pub mod sftp;
pub mod spool;
pub mod store;
pub mod vfs;
