//! Diff builder: classify every local file against the cache.
//!
//! Each accepted file lands in exactly one of `added`, `changed` or `unmod`.
//! Cached paths that have vanished from disk are reported in `removed`.
//! The cache passed in is not touched; the cache reflecting this scan is
//! returned alongside the request and only replaces the session's cache once
//! the server has accepted the request.

use crate::digest::Digest;
use crate::protocol::{File, SyncRequest};
use crate::sync::cache::LocalCache;
use crate::sync::ignore::PathFilter;
use crate::sync::urls::normalize_path;
use crate::sync::SyncError;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, info};

/// Result of scanning the sync root.
#[derive(Debug, Clone)]
pub struct Diff {
    pub request: SyncRequest,
    /// Cache state after this scan: one entry per accepted file on disk.
    pub cache: LocalCache,
}

/// Scan `base` and classify every accepted file against `cache`.
///
/// Errors walking the tree or reading a file abort the whole scan. A file
/// that disappears between listing and reading is simply skipped.
pub fn build_sync_request(
    base: &Path,
    cache: &LocalCache,
    filter: &mut dyn PathFilter,
) -> Result<Diff, SyncError> {
    if !base.is_dir() {
        return Err(SyncError::NotDirectory(base.display().to_string()));
    }

    filter.refresh()?;

    let mut scan = Scan {
        base,
        previous: cache,
        filter,
        diff: Diff {
            request: SyncRequest::new(),
            cache: LocalCache::new(),
        },
        seen: HashSet::new(),
    };
    scan.walk(base)?;
    scan.collect_removed();
    Ok(scan.diff)
}

struct Scan<'a> {
    base: &'a Path,
    previous: &'a LocalCache,
    filter: &'a mut dyn PathFilter,
    diff: Diff,
    seen: HashSet<String>,
}

impl Scan<'_> {
    fn walk(&mut self, current: &Path) -> Result<(), SyncError> {
        let read_dir = fs::read_dir(current).map_err(SyncError::io(current))?;

        for entry_result in read_dir {
            let entry = entry_result.map_err(SyncError::io(current))?;
            let entry_path = entry.path();
            let file_type = entry.file_type().map_err(SyncError::io(&entry_path))?;

            // Skip symlinks
            if file_type.is_symlink() {
                continue;
            }

            let relative = match entry_path.strip_prefix(self.base) {
                Ok(rel) => normalize_path(&rel.to_string_lossy()),
                Err(_) => continue,
            };

            if !self.filter.accepts(&relative, file_type.is_dir()) {
                continue;
            }

            if file_type.is_dir() {
                self.walk(&entry_path)?;
            } else if file_type.is_file() {
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(SyncError::io(&entry_path)(e)),
                };
                let mod_time = metadata.modified().map_err(SyncError::io(&entry_path))?;
                self.classify(&entry_path, relative, mod_time)?;
            }
            // Skip other types (sockets, devices, etc.)
        }

        Ok(())
    }

    fn classify(
        &mut self,
        path: &Path,
        relative: String,
        mod_time: SystemTime,
    ) -> Result<(), SyncError> {
        let request = &mut self.diff.request;

        match self.previous.get(&relative) {
            Some(cached) if cached.mod_time == mod_time => {
                debug!("unmodified {}", relative);
                request
                    .unmod
                    .insert(relative.clone(), File::reference(cached.digest.clone()));
                self.diff
                    .cache
                    .record(relative.clone(), mod_time, cached.digest.clone());
            }
            Some(cached) => {
                let Some(file) = read_file(path)? else {
                    return Ok(());
                };
                if file.digest == cached.digest {
                    debug!("touched without edit {}", relative);
                    request
                        .unmod
                        .insert(relative.clone(), file.to_reference());
                } else {
                    info!("changed {}", relative);
                    request.changed.insert(relative.clone(), file.clone());
                }
                self.diff.cache.record(relative.clone(), mod_time, file.digest);
            }
            None => {
                let Some(file) = read_file(path)? else {
                    return Ok(());
                };
                info!("added {}", relative);
                self.diff
                    .cache
                    .record(relative.clone(), mod_time, file.digest.clone());
                request.added.insert(relative.clone(), file);
            }
        }

        self.seen.insert(relative);
        Ok(())
    }

    /// Report cached paths that are no longer on disk.
    ///
    /// A path that still exists but was not classified (now ignored, or
    /// replaced by a directory) is dropped from the cache without being
    /// reported, so the server copy is left alone.
    fn collect_removed(&mut self) {
        for (path, cached) in self.previous.iter() {
            if self.seen.contains(path) {
                continue;
            }
            if fs::symlink_metadata(self.base.join(path)).is_ok() {
                debug!("no longer tracking {}", path);
                continue;
            }
            info!("removed {}", path);
            self.diff
                .request
                .removed
                .insert(path.clone(), File::reference(cached.digest.clone()));
        }
    }
}

/// Read a file into a [`File`], or `None` if it vanished.
fn read_file(path: &Path) -> Result<Option<File>, SyncError> {
    match fs::read(path) {
        Ok(content) => Ok(Some(File::new(content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path)(e)),
    }
}

/// Digest of a file on disk.
pub fn digest_file(path: &Path) -> Result<Digest, SyncError> {
    fs::read(path)
        .map(|content| Digest::of(&content))
        .map_err(SyncError::io(path))
}
