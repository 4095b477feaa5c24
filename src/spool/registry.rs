//! Registry of live upload spools keyed by virtual path.
//!
//! Each spool carries a rolling 24-hour idle timer; any successful `get`
//! refreshes it, explicit delete cancels it. Misses distinguish "never
//! registered / already removed" from "registered but the backing file
//! vanished", so callers can separate logic bugs from external deletion.

use crate::clock::{Clock, IdleMap};
use crate::error::{GatewayError, Result};
use crate::spool::upload::UploadSpool;
use crate::store::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const SPOOL_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub type SharedSpool = Arc<Mutex<UploadSpool>>;

pub struct TemporaryFileRegistry {
    spools: IdleMap<String, SharedSpool>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    spool_dir: PathBuf,
}

impl TemporaryFileRegistry {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        spool_dir: PathBuf,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            spools: IdleMap::new(SPOOL_IDLE_TTL, clock),
            store,
            bucket: bucket.into(),
            spool_dir,
        }
    }

    /// Reuse the spool registered under this path, or create and open a
    /// fresh one targeting the given object key.
    pub async fn open(&self, path: &str, key: &str) -> Result<SharedSpool> {
        if let Some(spool) = self.spools.get(&path.to_string()) {
            self.check_backing_file(path, &spool).await?;
            return Ok(spool);
        }
        let buffer_path = self.spool_dir.join(buffer_file_name(path));
        let mut spool = UploadSpool::new(self.store.clone(), self.bucket.clone(), key, buffer_path);
        spool.open().await?;
        let spool = Arc::new(Mutex::new(spool));
        self.spools.insert(path.to_string(), spool.clone());
        Ok(spool)
    }

    /// Fetch a live spool, refreshing its idle timer and verifying the
    /// backing file still exists.
    pub async fn get(&self, path: &str) -> Result<SharedSpool> {
        let spool = self
            .spools
            .get(&path.to_string())
            .ok_or_else(|| GatewayError::MissingTemporaryFileInMemory(path.to_string()))?;
        self.check_backing_file(path, &spool).await?;
        Ok(spool)
    }

    async fn check_backing_file(&self, path: &str, spool: &SharedSpool) -> Result<()> {
        let buffer_path = spool.lock().await.buffer_path().clone();
        if tokio::fs::metadata(&buffer_path).await.is_err() {
            return Err(GatewayError::MissingTemporaryFileOnDisk(path.to_string()));
        }
        Ok(())
    }

    /// Remove a finalized spool from the registry without touching its
    /// (already released) local storage.
    pub fn forget(&self, path: &str) {
        self.spools.remove(&path.to_string());
    }

    /// Remove a spool and delete its backing file.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let spool = self
            .spools
            .remove(&path.to_string())
            .ok_or_else(|| GatewayError::MissingTemporaryFileInMemory(path.to_string()))?;
        spool.lock().await.release_local().await
    }

    /// Evict spools idle past the ttl. Cleanup failures are logged only;
    /// eviction is fire-and-forget.
    pub async fn sweep(&self) -> usize {
        let expired = self.spools.sweep();
        let count = expired.len();
        for (path, spool) in expired {
            tracing::info!(%path, "evicting idle upload spool");
            if let Err(e) = spool.lock().await.release_local().await {
                tracing::warn!(%path, error = %e, "idle spool cleanup failed");
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.spools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spools.is_empty()
    }
}

fn buffer_file_name(path: &str) -> String {
    let sanitized: String = path
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}.spool", sanitized.trim_matches('_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemoryObjectStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn registry(dir: &std::path::Path) -> (TemporaryFileRegistry, ManualClock) {
        let clock = ManualClock::new();
        let registry = TemporaryFileRegistry::new(
            Arc::new(InMemoryObjectStore::new()),
            "bucket",
            dir.to_path_buf(),
            Arc::new(clock.clone()),
        );
        (registry, clock)
    }

    #[tokio::test]
    async fn ignored_spool_is_deleted_exactly_once_after_24h() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, clock) = registry(tmp.path());
        registry.open("/archives/Foo (42)/Docs/up.bin", "42/up.bin").await.unwrap();

        clock.advance(24 * HOUR);
        assert_eq!(registry.sweep().await, 1);
        assert_eq!(registry.sweep().await, 0, "already evicted");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn access_refreshes_the_idle_timer() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, clock) = registry(tmp.path());
        registry.open("/p", "k").await.unwrap();

        clock.advance(23 * HOUR);
        registry.get("/p").await.unwrap();

        clock.advance(23 * HOUR);
        assert_eq!(registry.sweep().await, 0, "refreshed at 23h");

        clock.advance(HOUR);
        assert_eq!(registry.sweep().await, 1);
    }

    #[tokio::test]
    async fn open_reuses_the_registered_spool() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(tmp.path());
        let a = registry.open("/p", "k").await.unwrap();
        let b = registry.open("/p", "k").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn misses_distinguish_memory_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(tmp.path());

        assert!(matches!(
            registry.get("/unknown").await,
            Err(GatewayError::MissingTemporaryFileInMemory(_))
        ));

        let spool = registry.open("/p", "k").await.unwrap();
        let buffer = spool.lock().await.buffer_path().clone();
        tokio::fs::remove_file(&buffer).await.unwrap();
        assert!(matches!(
            registry.get("/p").await,
            Err(GatewayError::MissingTemporaryFileOnDisk(_))
        ));
    }

    #[tokio::test]
    async fn reopen_detects_a_vanished_backing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry(tmp.path());
        let spool = registry.open("/p", "k").await.unwrap();
        let buffer = spool.lock().await.buffer_path().clone();
        tokio::fs::remove_file(&buffer).await.unwrap();

        assert!(matches!(
            registry.open("/p", "k").await,
            Err(GatewayError::MissingTemporaryFileOnDisk(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_spool_and_backing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, clock) = registry(tmp.path());
        let spool = registry.open("/p", "k").await.unwrap();
        let buffer = spool.lock().await.buffer_path().clone();

        registry.delete("/p").await.unwrap();
        assert!(tokio::fs::metadata(&buffer).await.is_err());
        assert!(matches!(
            registry.delete("/p").await,
            Err(GatewayError::MissingTemporaryFileInMemory(_))
        ));

        // Deleting cancelled the timer; nothing left to evict.
        clock.advance(25 * HOUR);
        assert_eq!(registry.sweep().await, 0);
    }
}
