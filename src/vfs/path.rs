//! Virtual path classification and archive-id extraction.
//!
//! Classification is total and disjoint: every string lands in exactly one
//! category. Anything that is not the root, the archive catalogue, an
//! archive or an archive's top-level child is an `Item` and gets resolved
//! against its parent folder.

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Root,
    ArchiveCatalogue,
    /// `/archives/<display-name> (<id>)`
    ArchivePath,
    /// Top-level folder of an archive.
    ArchiveChildFolder,
    /// Anything deeper (or outside `/archives`): folder or record.
    Item,
}

pub const ARCHIVES_SEGMENT: &str = "archives";

pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn classify(path: &str) -> PathKind {
    let segs = segments(path);
    match segs.as_slice() {
        [] => PathKind::Root,
        [ARCHIVES_SEGMENT] => PathKind::ArchiveCatalogue,
        [ARCHIVES_SEGMENT, _] => PathKind::ArchivePath,
        [ARCHIVES_SEGMENT, _, _] => PathKind::ArchiveChildFolder,
        _ => PathKind::Item,
    }
}

/// Resolve `.`/`..` against the virtual root and collapse slashes.
pub fn canonicalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    if out.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", out.join("/"))
    }
}

pub fn basename(path: &str) -> &str {
    segments(path).last().copied().unwrap_or("")
}

pub fn parent(path: &str) -> String {
    let segs = segments(path);
    if segs.len() <= 1 {
        return "/".to_string();
    }
    format!("/{}", segs[..segs.len() - 1].join("/"))
}

/// The trailing parenthesized token of the segment under `/archives`,
/// e.g. `"abc-123"` out of `/archives/My Archive (abc-123)/x`.
fn trailing_parenthetical(path: &str) -> Option<&str> {
    let segs = segments(path);
    if segs.len() < 2 || segs[0] != ARCHIVES_SEGMENT {
        return None;
    }
    let seg = segs[1];
    let open = seg.rfind('(')?;
    if !seg.ends_with(')') || open + 1 >= seg.len() - 1 {
        return None;
    }
    Some(&seg[open + 1..seg.len() - 1])
}

/// Numeric archive id from the path, or -1 when none can be extracted.
/// Callers must treat -1 as unresolvable, never as a usable id.
pub fn archive_id(path: &str) -> i64 {
    match trailing_parenthetical(path) {
        Some(token) if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => {
            token.parse().unwrap_or(-1)
        }
        _ => -1,
    }
}

/// Raw archive id token from the path; errors when the segment carries no
/// parenthesized id at all.
pub fn archive_slug(path: &str) -> Result<String> {
    trailing_parenthetical(path)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .ok_or_else(|| GatewayError::MissingArchiveId(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_and_disjoint() {
        assert_eq!(classify("/"), PathKind::Root);
        assert_eq!(classify(""), PathKind::Root);
        assert_eq!(classify("//"), PathKind::Root);
        assert_eq!(classify("/archives"), PathKind::ArchiveCatalogue);
        assert_eq!(classify("/archives/"), PathKind::ArchiveCatalogue);
        assert_eq!(classify("/archives/Foo (42)"), PathKind::ArchivePath);
        assert_eq!(classify("/archives/Foo (42)/Sub"), PathKind::ArchiveChildFolder);
        assert_eq!(classify("/archives/Foo (42)/Sub/deep"), PathKind::Item);
        assert_eq!(classify("/not-archives"), PathKind::Item);
        assert_eq!(classify("/not/archives"), PathKind::Item);
    }

    #[test]
    fn archive_id_extraction() {
        assert_eq!(archive_id("/archives/Foo (42)"), 42);
        assert_eq!(archive_id("/archives/Foo (42)/Sub"), 42);
        assert_eq!(archive_id("/not/archives"), -1);
        assert_eq!(archive_id("/archives/Foo"), -1);
        assert_eq!(archive_id("/archives/Foo ()"), -1);
        assert_eq!(archive_id("/archives/Foo (abc)"), -1);
    }

    #[test]
    fn archive_slug_extraction() {
        assert_eq!(
            archive_slug("/archives/My Archive (abc-123)/x/y").unwrap(),
            "abc-123"
        );
        assert!(matches!(
            archive_slug("/archives/My Archive"),
            Err(GatewayError::MissingArchiveId(_))
        ));
    }

    #[test]
    fn canonicalize_resolves_against_root() {
        assert_eq!(canonicalize("/a/b/../c"), "/a/c");
        assert_eq!(canonicalize("a//b/./"), "/a/b");
        assert_eq!(canonicalize("/.."), "/");
        assert_eq!(canonicalize(""), "/");
    }

    #[test]
    fn basename_and_parent() {
        assert_eq!(basename("/a/b/c"), "c");
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(parent("/a"), "/");
        assert_eq!(basename("/"), "");
    }
}
