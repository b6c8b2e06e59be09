//! Template file cache.

use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Read-once cache of template file contents.
///
/// The cache key is the canonicalized absolute path, so two relative
/// spellings of the same file share one entry. Contents are read at most
/// once per distinct path and retained for the lifetime of the cache;
/// later modifications to the file on disk are not picked up. Templates
/// are treated as immutable after first read.
#[derive(Debug)]
pub struct TemplateCache {
    root: PathBuf,
    entries: Mutex<HashMap<PathBuf, Arc<str>>>,
}

impl TemplateCache {
    /// Create a cache rooted at the given template directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Template root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a template addressed relative to the root, consulting the
    /// cache first.
    pub fn read(&self, template: impl AsRef<Path>) -> DbResult<Arc<str>> {
        let joined = self.root.join(template.as_ref());
        let resolved = joined
            .canonicalize()
            .map_err(|err| Self::classify_io(&joined, err))?;

        // The lock covers the read so a distinct path hits the disk at
        // most once, even under concurrent first callers.
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(text) = entries.get(&resolved) {
            return Ok(Arc::clone(text));
        }

        let text = std::fs::read_to_string(&resolved)
            .map_err(|err| Self::classify_io(&resolved, err))?;
        debug!(path = %resolved.display(), bytes = text.len(), "Loaded template");
        let text: Arc<str> = Arc::from(text);
        entries.insert(resolved, Arc::clone(&text));
        Ok(text)
    }

    fn classify_io(path: &Path, err: std::io::Error) -> DbError {
        match err.kind() {
            ErrorKind::NotFound => DbError::template_not_found(path),
            ErrorKind::PermissionDenied => DbError::template_io(path, "permission denied"),
            _ => DbError::template_io(path, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_returns_contents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("users.sql"), "SELECT 1").unwrap();

        let cache = TemplateCache::new(dir.path());
        assert_eq!(&*cache.read("users.sql").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(dir.path());
        let err = cache.read("nope.sql").unwrap_err();
        assert!(matches!(err, DbError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_cached_text_survives_file_modification() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("q.sql");
        fs::write(&file, "SELECT 1").unwrap();

        let cache = TemplateCache::new(dir.path());
        assert_eq!(&*cache.read("q.sql").unwrap(), "SELECT 1");

        fs::write(&file, "SELECT 2").unwrap();
        // Still the first read: the cache never re-reads a path.
        assert_eq!(&*cache.read("q.sql").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_cache_key_is_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("q.sql");
        fs::write(&file, "SELECT 1").unwrap();

        let cache = TemplateCache::new(dir.path());
        let a = cache.read("q.sql").unwrap();
        let b = cache.read("./q.sql").unwrap();
        // Both spellings resolve to one entry.
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_fresh_cache_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("q.sql");
        fs::write(&file, "SELECT 1").unwrap();

        let first = TemplateCache::new(dir.path());
        assert_eq!(&*first.read("q.sql").unwrap(), "SELECT 1");

        fs::write(&file, "SELECT 2").unwrap();
        let second = TemplateCache::new(dir.path());
        assert_eq!(&*second.read("q.sql").unwrap(), "SELECT 2");
    }
}
