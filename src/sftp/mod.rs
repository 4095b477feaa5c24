//! Protocol-level request/handle state machine.
//!
//! Submodules:
//! - `message`: classified requests, terminal responses, status codes
//! - `handles`: per-session directory/file handle tables
//! - `engine`: the dispatcher, one instance per session

pub mod engine;
pub mod handles;
pub mod message;
