//! The client's record of what it last saw for every tracked path.

use crate::digest::Digest;
use std::collections::HashMap;
use std::time::SystemTime;

/// Last-seen state for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub mod_time: SystemTime,
    pub digest: Digest,
}

/// Relative path -> [`CachedFile`]. Owned by a single sync session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCache {
    files: HashMap<String, CachedFile>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&CachedFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Record the state of `path` after reading, pushing or pulling it.
    pub fn record(&mut self, path: impl Into<String>, mod_time: SystemTime, digest: Digest) {
        self.files
            .insert(path.into(), CachedFile { mod_time, digest });
    }

    pub fn forget(&mut self, path: &str) -> Option<CachedFile> {
        self.files.remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CachedFile)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_replaces_entry() {
        let mut cache = LocalCache::new();
        let t0 = SystemTime::UNIX_EPOCH;
        let t1 = t0 + Duration::from_secs(1);

        cache.record("a.txt", t0, Digest::of(b"one"));
        cache.record("a.txt", t1, Digest::of(b"two"));

        assert_eq!(cache.len(), 1);
        let entry = cache.get("a.txt").unwrap();
        assert_eq!(entry.mod_time, t1);
        assert_eq!(entry.digest, Digest::of(b"two"));
    }

    #[test]
    fn test_forget() {
        let mut cache = LocalCache::new();
        cache.record("a.txt", SystemTime::UNIX_EPOCH, Digest::of(b"x"));
        assert!(cache.forget("a.txt").is_some());
        assert!(cache.forget("a.txt").is_none());
        assert!(cache.is_empty());
    }
}
