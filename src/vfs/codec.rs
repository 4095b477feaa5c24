//! Attribute/direntry codec: pure conversions from remote entities to
//! protocol attributes and directory entries.
//!
//! Attributes share one shape for archives, folders and files: full rwx
//! for everyone, uid/gid 0, atime 0, mtime from the entity's updated
//! timestamp when it has one.

use crate::remote::api::{Archive, Folder, Record};
use chrono::{DateTime, Utc};

const TYPE_MASK: u32 = 0o170000;
const DIR_TYPE: u32 = 0o040000;
const FILE_TYPE: u32 = 0o100000;
const ALL_RWX: u32 = 0o777;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttrs {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
}

impl FileAttrs {
    pub fn is_dir(&self) -> bool {
        self.mode & TYPE_MASK == DIR_TYPE
    }
}

#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub longname: String,
    pub attrs: FileAttrs,
}

pub fn dir_attrs(mtime: u64) -> FileAttrs {
    FileAttrs {
        mode: DIR_TYPE | ALL_RWX,
        uid: 0,
        gid: 0,
        size: 0,
        atime: 0,
        mtime,
    }
}

pub fn file_attrs(size: u64, mtime: u64) -> FileAttrs {
    FileAttrs {
        mode: FILE_TYPE | ALL_RWX,
        uid: 0,
        gid: 0,
        size,
        atime: 0,
        mtime,
    }
}

pub fn epoch_secs(at: Option<DateTime<Utc>>) -> u64 {
    at.map(|t| t.timestamp().max(0) as u64).unwrap_or(0)
}

pub fn longname(name: &str, attrs: &FileAttrs) -> String {
    let type_char = if attrs.is_dir() { 'd' } else { '-' };
    format!("{type_char} rwxrwxrwx 1 nobody nogroup {name}")
}

pub fn entry(name: impl Into<String>, attrs: FileAttrs) -> DirEntry {
    let name = name.into();
    let longname = longname(&name, &attrs);
    DirEntry {
        name,
        longname,
        attrs,
    }
}

/// Catalogue entry for an archive: `"<name> (<id>)"`.
pub fn archive_entry(archive: &Archive) -> DirEntry {
    entry(archive_dir_name(archive), dir_attrs(0))
}

pub fn archive_dir_name(archive: &Archive) -> String {
    format!("{} ({})", archive.name, archive.id)
}

pub fn folder_entry(folder: &Folder) -> DirEntry {
    entry(folder.name.clone(), dir_attrs(epoch_secs(folder.updated_at)))
}

/// Record entries surface the Original derivative's size when the record
/// has one; a record still processing shows up with size 0.
pub fn record_entry(record: &Record) -> DirEntry {
    let size = record.original().map(|f| f.size).unwrap_or(0);
    entry(
        record.name.clone(),
        file_attrs(size, epoch_secs(record.updated_at)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::api::DerivativeFile;

    fn record(name: &str, size: u64) -> Record {
        Record {
            id: 7,
            name: name.into(),
            files: vec![DerivativeFile {
                derivative: "Original".into(),
                size,
                url: "https://content/7".into(),
            }],
            updated_at: None,
        }
    }

    #[test]
    fn longname_leading_char_matches_type_bit() {
        let d = folder_entry(&Folder {
            id: 1,
            name: "docs".into(),
            folders: vec![],
            records: vec![],
            updated_at: None,
        });
        assert!(d.attrs.is_dir());
        assert!(d.longname.starts_with("d rwxrwxrwx 1 nobody nogroup docs"));

        let f = record_entry(&record("scan.tif", 12));
        assert!(!f.attrs.is_dir());
        assert!(f.longname.starts_with("- rwxrwxrwx 1 nobody nogroup scan.tif"));
        assert_eq!(f.attrs.size, 12);
    }

    #[test]
    fn attrs_share_one_shape() {
        let a = dir_attrs(99);
        assert_eq!((a.uid, a.gid, a.atime, a.mtime), (0, 0, 0, 99));
        assert_eq!(a.mode & 0o777, 0o777);

        let b = file_attrs(5, 0);
        assert_eq!((b.uid, b.gid, b.size), (0, 0, 5));
    }

    #[test]
    fn archive_entries_embed_the_id() {
        let e = archive_entry(&Archive {
            id: 42,
            name: "Foo".into(),
        });
        assert_eq!(e.name, "Foo (42)");
        assert!(e.attrs.is_dir());
    }
}
