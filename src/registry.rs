//! One virtual filesystem per authenticated user, reused across
//! reconnects and dropped wholesale (caches and all, no flush) after five
//! idle minutes.

use crate::clock::{Clock, IdleMap};
use crate::vfs::fs::VirtualFileSystem;
use std::sync::Arc;
use std::time::Duration;

pub const FILESYSTEM_IDLE_TTL: Duration = Duration::from_secs(5 * 60);

pub struct FileSystemRegistry {
    filesystems: IdleMap<String, Arc<VirtualFileSystem>>,
}

impl FileSystemRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            filesystems: IdleMap::new(FILESYSTEM_IDLE_TTL, clock),
        }
    }

    /// Filesystem for this user, creating one on first access. Every call
    /// refreshes the idle timer.
    pub fn for_user(
        &self,
        username: &str,
        make: impl FnOnce() -> VirtualFileSystem,
    ) -> Arc<VirtualFileSystem> {
        self.filesystems
            .get_or_insert_with(&username.to_string(), || Arc::new(make()))
    }

    /// Drop filesystems idle past the ttl; their caches go with them.
    pub fn sweep(&self) -> usize {
        let evicted = self.filesystems.sweep();
        for (username, _) in &evicted {
            tracing::info!(%username, "evicting idle virtual filesystem");
        }
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.filesystems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filesystems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::remote::api::InMemoryArchiveApi;

    const MINUTE: Duration = Duration::from_secs(60);

    fn make_fs() -> VirtualFileSystem {
        VirtualFileSystem::new(Arc::new(InMemoryArchiveApi::default()))
    }

    #[test]
    fn same_instance_across_reconnects() {
        let clock = ManualClock::new();
        let registry = FileSystemRegistry::new(Arc::new(clock.clone()));
        let a = registry.for_user("alice", make_fs);
        let b = registry.for_user("alice", make_fs);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn idle_instances_are_dropped_after_five_minutes() {
        let clock = ManualClock::new();
        let registry = FileSystemRegistry::new(Arc::new(clock.clone()));
        let first = registry.for_user("alice", make_fs);

        clock.advance(4 * MINUTE);
        registry.for_user("alice", make_fs);
        clock.advance(4 * MINUTE);
        assert_eq!(registry.sweep(), 0, "access refreshed the timer");

        clock.advance(MINUTE);
        assert_eq!(registry.sweep(), 1);

        // A later access builds a fresh instance with empty caches.
        let second = registry.for_user("alice", make_fs);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
