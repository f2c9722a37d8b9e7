//! Cache keys: relative request paths that map onto the cache root.

use std::fmt;
use std::path::{Path, PathBuf};

use super::CacheError;
use crate::constants::STAGING_DIRECTORY;

/// A normalized, relative path identifying one cache entry.
///
/// Empty and `.` segments are dropped, so `a//b/./c` and `a/b/c` are the same
/// key. Keys never contain `..` and never start with the staging directory,
/// which keeps every key inside the cache root and away from in-progress
/// temporary files. The empty key addresses the cache root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let invalid = |reason| CacheError::InvalidKey {
            key: raw.to_string(),
            reason,
        };

        if raw.starts_with('/') {
            return Err(invalid("path should not start with a slash"));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(invalid("parent directory segments are not allowed")),
                s if s.contains('\0') => return Err(invalid("NUL bytes are not allowed")),
                s => segments.push(s),
            }
        }
        if segments.first() == Some(&STAGING_DIRECTORY) {
            return Err(invalid("the staging directory is not addressable"));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Location of this entry under `root`
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.segments()
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
