//! Apply engine: materialize a sync response on disk and in the cache.

use crate::digest::Digest;
use crate::protocol::SyncResponse;
use crate::sync::cache::LocalCache;
use crate::sync::SyncError;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Paths touched while applying one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub written: Vec<String>,
    pub deleted: Vec<String>,
}

/// Write every update and remove every deletion under `base`, keeping `cache`
/// in step with what is now on disk.
///
/// Stops at the first failure; paths already applied stay applied and cached.
pub fn apply_sync_response(
    response: &SyncResponse,
    base: &Path,
    cache: &mut LocalCache,
) -> Result<ApplyReport, SyncError> {
    let mut report = ApplyReport::default();

    for (relative, file) in &response.update {
        let Some(content) = file.content.as_deref() else {
            warn!("server sent {} without content; skipping", relative);
            continue;
        };
        let full_path = resolve_path(base, relative)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(SyncError::io(parent))?;
        }
        fs::write(&full_path, content).map_err(SyncError::io(&full_path))?;

        let mod_time = fs::metadata(&full_path)
            .and_then(|m| m.modified())
            .map_err(SyncError::io(&full_path))?;
        let digest = Digest::of(content);
        if digest != file.digest {
            warn!("digest mismatch for {} from server; caching local digest", relative);
        }
        cache.record(relative.clone(), mod_time, digest);

        info!("updated {}", relative);
        report.written.push(relative.clone());
    }

    for relative in &response.delete {
        let full_path = resolve_path(base, relative)?;
        match fs::remove_file(&full_path) {
            Ok(()) => info!("deleted {}", relative),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::io(&full_path)(e)),
        }
        cache.forget(relative);
        report.deleted.push(relative.clone());
    }

    Ok(report)
}

/// Join a server-supplied relative path onto `base`, refusing anything that
/// could escape it.
pub fn resolve_path(base: &Path, relative: &str) -> Result<PathBuf, SyncError> {
    let path = Path::new(relative);
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return Err(SyncError::UnsafePath(relative.to_string()));
    }
    if !components.all(|c| matches!(c, Component::Normal(_))) {
        return Err(SyncError::UnsafePath(relative.to_string()));
    }
    Ok(base.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::File;
    use std::time::SystemTime;

    #[test]
    fn test_updates_write_files_and_cache() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = LocalCache::new();
        let mut response = SyncResponse::default();
        response
            .update
            .insert("deep/nested/a.txt".into(), File::new("hello"));

        let report = apply_sync_response(&response, temp.path(), &mut cache).unwrap();

        assert_eq!(report.written, vec!["deep/nested/a.txt"]);
        let on_disk = fs::read(temp.path().join("deep/nested/a.txt")).unwrap();
        assert_eq!(on_disk, b"hello");
        let cached = cache.get("deep/nested/a.txt").unwrap();
        assert_eq!(cached.digest, Digest::of(b"hello"));
        assert_eq!(
            cached.mod_time,
            fs::metadata(temp.path().join("deep/nested/a.txt"))
                .unwrap()
                .modified()
                .unwrap()
        );
    }

    #[test]
    fn test_update_truncates_existing_file() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), b"a much longer original").unwrap();
        let mut response = SyncResponse::default();
        response.update.insert("a.txt".into(), File::new("short"));

        apply_sync_response(&response, temp.path(), &mut LocalCache::new()).unwrap();

        assert_eq!(fs::read(temp.path().join("a.txt")).unwrap(), b"short");
    }

    #[test]
    fn test_deletes_remove_file_and_cache_entry() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("gone.txt"), b"bye").unwrap();
        let mut cache = LocalCache::new();
        cache.record("gone.txt", SystemTime::now(), Digest::of(b"bye"));
        cache.record("never-existed.txt", SystemTime::now(), Digest::of(b"?"));

        let response = SyncResponse {
            update: Default::default(),
            delete: vec!["gone.txt".into(), "never-existed.txt".into()],
        };
        let report = apply_sync_response(&response, temp.path(), &mut cache).unwrap();

        assert_eq!(report.deleted.len(), 2);
        assert!(!temp.path().join("gone.txt").exists());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reference_updates_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let mut response = SyncResponse::default();
        response
            .update
            .insert("a.txt".into(), File::new("x").to_reference());

        let report = apply_sync_response(&response, temp.path(), &mut LocalCache::new()).unwrap();

        assert!(report.written.is_empty());
        assert!(!temp.path().join("a.txt").exists());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let base = Path::new("/srv/share");
        assert!(resolve_path(base, "a/b.txt").is_ok());
        for bad in ["../etc/passwd", "/etc/passwd", "a/../../b", "", "./a"] {
            assert!(
                matches!(resolve_path(base, bad), Err(SyncError::UnsafePath(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_unsafe_update_aborts_before_writing() {
        let temp = tempfile::tempdir().unwrap();
        let mut response = SyncResponse::default();
        response.update.insert("../escape.txt".into(), File::new("x"));

        let result = apply_sync_response(&response, temp.path(), &mut LocalCache::new());
        assert!(matches!(result, Err(SyncError::UnsafePath(_))));
    }
}
