//! Remote collaborators: the archive API and the bearer-token contract.

pub mod api;
pub mod auth;
