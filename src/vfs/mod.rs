//! Virtual filesystem layer: path classification, read-through caching
//! and resolution of virtual paths onto remote archive entities.

pub mod cache;
pub mod codec;
pub mod fs;
pub mod path;
