//! Write-path staging: upload spools and their idle-evicted registry.

pub mod registry;
pub mod upload;
