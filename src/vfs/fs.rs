//! Path-resolving virtual filesystem over the remote archive API.
//!
//! One instance per authenticated user. Lookups go through per-instance
//! read-through caches (archive list, top-level folders by archive id,
//! folders and records by path); nothing is ever invalidated short of
//! dropping the whole instance.

use crate::error::{GatewayError, Result};
use crate::remote::api::{Archive, ArchiveApi, Folder, Record};
use crate::vfs::cache::ReadThroughCache;
use crate::vfs::codec::{self, DirEntry, FileAttrs};
use crate::vfs::path::{self, PathKind};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// A record's Original derivative, resolved and ready to stream.
#[derive(Debug, Clone)]
pub struct OriginalContent {
    pub record_id: i64,
    pub size: u64,
    pub url: String,
}

pub struct VirtualFileSystem {
    api: Arc<dyn ArchiveApi>,
    archives: ReadThroughCache<(), Vec<Archive>>,
    archive_folders: ReadThroughCache<i64, Vec<Folder>>,
    folders_by_path: ReadThroughCache<String, Folder>,
    records_by_path: ReadThroughCache<String, Record>,
}

impl VirtualFileSystem {
    pub fn new(api: Arc<dyn ArchiveApi>) -> Self {
        Self {
            api,
            archives: ReadThroughCache::new(),
            archive_folders: ReadThroughCache::new(),
            folders_by_path: ReadThroughCache::new(),
            records_by_path: ReadThroughCache::new(),
        }
    }

    async fn archives(&self) -> Result<Vec<Archive>> {
        if let Some(archives) = self.archives.get(&()) {
            return Ok(archives);
        }
        let archives = self.api.list_archives().await?;
        self.archives.put((), archives.clone());
        Ok(archives)
    }

    /// Top-level folders of the archive named by the path, keyed by the
    /// extracted archive id.
    async fn top_folders(&self, path: &str) -> Result<Vec<Folder>> {
        let id = path::archive_id(path);
        if id < 0 {
            return Err(GatewayError::NotFound(path.to_string()));
        }
        if let Some(folders) = self.archive_folders.get(&id) {
            return Ok(folders);
        }
        let folders = self.api.list_archive_folders(id).await?;
        self.archive_folders.put(id, folders.clone());
        Ok(folders)
    }

    /// Walk the path down from the archive's top-level folders, populating
    /// and caching each folder level once.
    async fn resolve_folder(&self, path: &str) -> Result<Folder> {
        let path = path::canonicalize(path);
        let segs = path::segments(&path);
        // Outside /archives nothing exists; under it, a too-shallow path
        // is a wrong-category call rather than a missing entity.
        if segs.first() != Some(&path::ARCHIVES_SEGMENT) {
            return Err(GatewayError::NotFound(path.clone()));
        }
        if segs.len() < 3 {
            return Err(GatewayError::InvalidOperationForPath(path.clone()));
        }
        let archive_id = path::archive_id(&path);

        let mut cur = format!("/{}/{}", segs[0], segs[1]);
        let mut children = self.top_folders(&path).await?;
        let mut resolved: Option<Folder> = None;

        for seg in &segs[2..] {
            cur.push('/');
            cur.push_str(seg);
            if let Some(folder) = self.folders_by_path.get(&cur) {
                children = folder.folders.clone();
                resolved = Some(folder);
                continue;
            }
            let child = children
                .iter()
                .find(|f| f.name == *seg)
                .ok_or_else(|| GatewayError::NotFound(cur.clone()))?;
            let populated = self.api.get_folder(child.id, archive_id).await?;
            self.folders_by_path.put(cur.clone(), populated.clone());
            children = populated.folders.clone();
            resolved = Some(populated);
        }
        resolved.ok_or_else(|| GatewayError::InvalidOperationForPath(path))
    }

    async fn resolve_record(&self, path: &str) -> Result<Record> {
        let path = path::canonicalize(path);
        if let Some(record) = self.records_by_path.get(&path) {
            return Ok(record);
        }
        let parent = path::parent(&path);
        match path::classify(&parent) {
            PathKind::ArchiveChildFolder | PathKind::Item => {}
            _ => return Err(GatewayError::NotFound(path.clone())),
        }
        let folder = self.resolve_folder(&parent).await?;
        let name = path::basename(&path);
        let summary = folder
            .records
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| GatewayError::NotFound(path.clone()))?;
        let record = self
            .api
            .get_record(summary.id, path::archive_id(&path))
            .await?;
        self.records_by_path.put(path, record.clone());
        Ok(record)
    }

    /// Directory for every non-Item category; Item paths resolve against
    /// their parent folder and fail NotFound when the basename matches
    /// neither a record nor a child folder.
    pub async fn resolve_type(&self, path: &str) -> Result<EntryKind> {
        match path::classify(path) {
            PathKind::Root
            | PathKind::ArchiveCatalogue
            | PathKind::ArchivePath
            | PathKind::ArchiveChildFolder => Ok(EntryKind::Directory),
            PathKind::Item => {
                let canonical = path::canonicalize(path);
                if path::classify(&canonical) != PathKind::Item {
                    // `..` segments collapsed the path into a directory
                    // category.
                    return Ok(EntryKind::Directory);
                }
                let parent = path::parent(&canonical);
                match path::classify(&parent) {
                    PathKind::ArchiveChildFolder | PathKind::Item => {}
                    _ => return Err(GatewayError::NotFound(path.to_string())),
                }
                let folder = self.resolve_folder(&parent).await?;
                let name = path::basename(&canonical);
                if folder.records.iter().any(|r| r.name == name) {
                    Ok(EntryKind::File)
                } else if folder.folders.iter().any(|f| f.name == name) {
                    Ok(EntryKind::Directory)
                } else {
                    Err(GatewayError::NotFound(path.to_string()))
                }
            }
        }
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        match path::classify(path) {
            PathKind::Root => Ok(vec![codec::entry(
                path::ARCHIVES_SEGMENT,
                codec::dir_attrs(0),
            )]),
            PathKind::ArchiveCatalogue => {
                let archives = self.archives().await?;
                Ok(archives.iter().map(codec::archive_entry).collect())
            }
            PathKind::ArchivePath => {
                let folders = self.top_folders(path).await?;
                Ok(folders.iter().map(codec::folder_entry).collect())
            }
            PathKind::ArchiveChildFolder | PathKind::Item => {
                let folder = self.resolve_folder(path).await?;
                let mut entries: Vec<DirEntry> =
                    folder.folders.iter().map(codec::folder_entry).collect();
                entries.extend(folder.records.iter().map(codec::record_entry));
                Ok(dedupe_by_name(entries))
            }
        }
    }

    /// Resolve the record behind an Item path down to its Original
    /// derivative.
    pub async fn load_file(&self, path: &str) -> Result<OriginalContent> {
        if path::classify(path) != PathKind::Item {
            return Err(GatewayError::InvalidOperationForPath(path.to_string()));
        }
        let record = self.resolve_record(path).await?;
        let original = record
            .original()
            .ok_or(GatewayError::MissingOriginalFile(record.id))?;
        if original.url.is_empty() {
            return Err(GatewayError::IncompleteOriginalFile(record.id));
        }
        Ok(OriginalContent {
            record_id: record.id,
            size: original.size,
            url: original.url.clone(),
        })
    }

    /// Codec-synthesized attributes for the path's resolved type.
    pub async fn stat(&self, path: &str) -> Result<FileAttrs> {
        match path::classify(path) {
            PathKind::Root | PathKind::ArchiveCatalogue => Ok(codec::dir_attrs(0)),
            PathKind::ArchivePath => {
                let id = path::archive_id(path);
                let known = self.archives().await?.iter().any(|a| a.id == id);
                if !known {
                    return Err(GatewayError::NotFound(path.to_string()));
                }
                Ok(codec::dir_attrs(0))
            }
            PathKind::ArchiveChildFolder => {
                let folder = self.resolve_folder(path).await?;
                Ok(codec::dir_attrs(codec::epoch_secs(folder.updated_at)))
            }
            PathKind::Item => match self.resolve_record(path).await {
                Ok(record) => {
                    let size = record.original().map(|f| f.size).unwrap_or(0);
                    Ok(codec::file_attrs(size, codec::epoch_secs(record.updated_at)))
                }
                Err(GatewayError::NotFound(_)) => {
                    let folder = self.resolve_folder(path).await?;
                    Ok(codec::dir_attrs(codec::epoch_secs(folder.updated_at)))
                }
                Err(e) => Err(e),
            },
        }
    }
}

/// Drop later entries that repeat an earlier name, keeping first-seen
/// order: a guard against the remote API surfacing duplicate logical
/// names in one folder.
pub fn dedupe_by_name(entries: Vec<DirEntry>) -> Vec<DirEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::api::{DerivativeFile, InMemoryArchiveApi};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn folder(id: i64, name: &str) -> Folder {
        Folder {
            id,
            name: name.into(),
            folders: vec![],
            records: vec![],
            updated_at: None,
        }
    }

    fn record(id: i64, name: &str, files: Vec<DerivativeFile>) -> Record {
        Record {
            id,
            name: name.into(),
            files,
            updated_at: None,
        }
    }

    fn original(url: &str) -> DerivativeFile {
        DerivativeFile {
            derivative: "Original".into(),
            size: 1234,
            url: url.into(),
        }
    }

    /// /archives/Foo (42)/Docs with a child folder `Sub` and records
    /// `scan.tif` (usable), `raw.tif` (no Original), `slow.tif`
    /// (Original without content).
    fn fixture() -> Arc<InMemoryArchiveApi> {
        let mut api = InMemoryArchiveApi {
            archives: vec![Archive {
                id: 42,
                name: "Foo".into(),
            }],
            ..Default::default()
        };
        let mut docs = folder(1, "Docs");
        docs.folders.push(folder(2, "Sub"));
        docs.records.push(record(7, "scan.tif", vec![]));
        docs.records.push(record(8, "raw.tif", vec![]));
        docs.records.push(record(9, "slow.tif", vec![]));
        api.top_folders.insert(42, vec![docs.clone()]);
        api.folders.insert(1, docs);
        api.folders.insert(2, folder(2, "Sub"));
        api.records
            .insert(7, record(7, "scan.tif", vec![original("https://content/7")]));
        api.records.insert(
            8,
            record(
                8,
                "raw.tif",
                vec![DerivativeFile {
                    derivative: "Thumbnail".into(),
                    size: 10,
                    url: "https://content/8".into(),
                }],
            ),
        );
        api.records
            .insert(9, record(9, "slow.tif", vec![original("")]));
        Arc::new(api)
    }

    #[tokio::test]
    async fn directory_categories_never_resolve_records() {
        let api = fixture();
        let fs = VirtualFileSystem::new(api.clone());
        for p in ["/", "/archives", "/archives/Foo (42)", "/archives/Foo (42)/Docs"] {
            assert_eq!(fs.resolve_type(p).await.unwrap(), EntryKind::Directory);
            fs.list_directory(p).await.unwrap();
        }
        // Nothing above touched get_record: archive list + top folders +
        // Docs population only.
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test]
    async fn item_resolution_distinguishes_records_and_folders() {
        let fs = VirtualFileSystem::new(fixture());
        assert_eq!(
            fs.resolve_type("/archives/Foo (42)/Docs/scan.tif")
                .await
                .unwrap(),
            EntryKind::File
        );
        assert_eq!(
            fs.resolve_type("/archives/Foo (42)/Docs/Sub/..").await.unwrap(),
            EntryKind::Directory
        );
        assert!(matches!(
            fs.resolve_type("/archives/Foo (42)/Docs/missing.tif").await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn paths_outside_the_catalogue_are_not_found() {
        let fs = VirtualFileSystem::new(fixture());
        assert!(matches!(
            fs.resolve_type("/foo/bar").await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            fs.stat("/foo/bar").await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            fs.list_directory("/foo/bar").await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn folder_listing_mixes_folders_then_records() {
        let fs = VirtualFileSystem::new(fixture());
        let entries = fs.list_directory("/archives/Foo (42)/Docs").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Sub", "scan.tif", "raw.tif", "slow.tif"]);
        assert!(entries[0].attrs.is_dir());
        assert!(entries[0].longname.starts_with('d'));
        assert!(!entries[1].attrs.is_dir());
        assert!(entries[1].longname.starts_with('-'));
    }

    #[tokio::test]
    async fn root_and_catalogue_listings() {
        let fs = VirtualFileSystem::new(fixture());
        let root = fs.list_directory("/").await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "archives");

        let catalogue = fs.list_directory("/archives").await.unwrap();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].name, "Foo (42)");
    }

    #[tokio::test]
    async fn listings_are_cached_per_key() {
        let api = fixture();
        let fs = VirtualFileSystem::new(api.clone());
        fs.list_directory("/archives").await.unwrap();
        fs.list_directory("/archives/Foo (42)/Docs").await.unwrap();
        let after_first = api.call_count();
        fs.list_directory("/archives").await.unwrap();
        fs.list_directory("/archives/Foo (42)/Docs").await.unwrap();
        assert_eq!(api.call_count(), after_first);

        // Each cache was populated exactly once.
        assert_eq!(fs.archives.populations(), 1);
        assert_eq!(fs.archive_folders.populations(), 1);
        assert_eq!(fs.folders_by_path.populations(), 1);
    }

    #[tokio::test]
    async fn load_file_resolves_the_original_derivative() {
        let fs = VirtualFileSystem::new(fixture());
        let content = fs
            .load_file("/archives/Foo (42)/Docs/scan.tif")
            .await
            .unwrap();
        assert_eq!(content.record_id, 7);
        assert_eq!(content.size, 1234);
        assert_eq!(content.url, "https://content/7");
    }

    #[tokio::test]
    async fn load_file_failure_modes() {
        let fs = VirtualFileSystem::new(fixture());
        assert!(matches!(
            fs.load_file("/archives/Foo (42)/Docs/raw.tif").await,
            Err(GatewayError::MissingOriginalFile(8))
        ));
        assert!(matches!(
            fs.load_file("/archives/Foo (42)/Docs/slow.tif").await,
            Err(GatewayError::IncompleteOriginalFile(9))
        ));
        assert!(matches!(
            fs.load_file("/archives").await,
            Err(GatewayError::InvalidOperationForPath(_))
        ));
    }

    #[tokio::test]
    async fn stat_answers_every_category() {
        let fs = VirtualFileSystem::new(fixture());
        assert!(fs.stat("/").await.unwrap().is_dir());
        assert!(fs.stat("/archives").await.unwrap().is_dir());
        assert!(fs.stat("/archives/Foo (42)").await.unwrap().is_dir());
        assert!(fs.stat("/archives/Foo (42)/Docs").await.unwrap().is_dir());
        let file = fs.stat("/archives/Foo (42)/Docs/scan.tif").await.unwrap();
        assert!(!file.is_dir());
        assert_eq!(file.size, 1234);
        assert!(matches!(
            fs.stat("/archives/Bar (1)").await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[test]
    fn dedupe_keeps_first_occurrence_in_order() {
        let mk = |n: &str| codec::entry(n, codec::dir_attrs(0));
        let deduped = dedupe_by_name(vec![mk("a"), mk("b"), mk("a"), mk("c"), mk("b")]);
        let names: Vec<&str> = deduped.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    /// First archive listing fails; the failure must not poison the cache.
    struct FlakyApi {
        inner: Arc<InMemoryArchiveApi>,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl ArchiveApi for FlakyApi {
        async fn list_archives(&self) -> Result<Vec<Archive>> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(GatewayError::Storage("transient".into()));
            }
            self.inner.list_archives().await
        }
        async fn list_archive_folders(&self, archive_id: i64) -> Result<Vec<Folder>> {
            self.inner.list_archive_folders(archive_id).await
        }
        async fn get_folder(&self, folder_id: i64, archive_id: i64) -> Result<Folder> {
            self.inner.get_folder(folder_id, archive_id).await
        }
        async fn get_record(&self, record_id: i64, archive_id: i64) -> Result<Record> {
            self.inner.get_record(record_id, archive_id).await
        }
    }

    #[tokio::test]
    async fn failed_population_is_not_cached() {
        let fs = VirtualFileSystem::new(Arc::new(FlakyApi {
            inner: fixture(),
            failed_once: AtomicBool::new(false),
        }));
        assert!(fs.list_directory("/archives").await.is_err());
        let retried = fs.list_directory("/archives").await.unwrap();
        assert_eq!(retried.len(), 1);
    }
}
