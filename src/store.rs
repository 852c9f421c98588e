//! In-memory file store shared by every request handler.
//!
//! The server holds two of these: the static store (canonical directory
//! contents) and the live store (in-progress editor buffers). Neither exposes
//! its map. Reads take a snapshot or run a closure under the read lock;
//! read-modify-write sequences run inside [`FileStore::update`] under one
//! write lock. Every committed mutation bumps a version counter that pollers
//! can wait on instead of sleeping blindly.

use crate::protocol::File;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{watch, RwLock};

pub struct FileStore {
    files: RwLock<HashMap<String, File>>,
    version: watch::Sender<u64>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            files: RwLock::new(HashMap::new()),
            version,
        }
    }

    pub async fn get(&self, key: &str) -> Option<File> {
        let files = self.files.read().await;
        files.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        let files = self.files.read().await;
        files.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    /// Sorted list of stored keys.
    pub async fn keys(&self) -> Vec<String> {
        let files = self.files.read().await;
        let mut keys: Vec<String> = files.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of the whole store, ordered by key.
    pub async fn snapshot(&self) -> BTreeMap<String, File> {
        let files = self.files.read().await;
        files
            .iter()
            .map(|(key, file)| (key.clone(), file.clone()))
            .collect()
    }

    /// Run `f` against a read-only view without copying the store.
    pub async fn inspect<R>(&self, f: impl FnOnce(&StoreView<'_>) -> R) -> R {
        let files = self.files.read().await;
        f(&StoreView { files: &*files })
    }

    /// Run a read-modify-write sequence under a single write lock.
    ///
    /// Waiters are notified once after the lock is released, and only if the
    /// closure actually mutated the store.
    pub async fn update<R>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> R) -> R {
        let (result, dirty) = {
            let mut files = self.files.write().await;
            let mut txn = StoreTxn {
                files: &mut *files,
                dirty: false,
            };
            let result = f(&mut txn);
            (result, txn.dirty)
        };

        if dirty {
            self.version.send_modify(|version| *version += 1);
        }
        result
    }

    pub async fn insert(&self, key: impl Into<String>, file: File) -> Option<File> {
        let key = key.into();
        self.update(|txn| txn.insert(key, file)).await
    }

    pub async fn remove(&self, key: &str) -> Option<File> {
        self.update(|txn| txn.remove(key)).await
    }

    /// Receiver that observes every committed mutation after this call.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

/// Read-only access handed to [`FileStore::inspect`] closures.
pub struct StoreView<'a> {
    files: &'a HashMap<String, File>,
}

impl StoreView<'_> {
    pub fn get(&self, key: &str) -> Option<&File> {
        self.files.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &File)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Mutable access handed to [`FileStore::update`] closures.
pub struct StoreTxn<'a> {
    files: &'a mut HashMap<String, File>,
    dirty: bool,
}

impl StoreTxn<'_> {
    pub fn get(&self, key: &str) -> Option<&File> {
        self.files.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn insert(&mut self, key: String, file: File) -> Option<File> {
        self.dirty = true;
        self.files.insert(key, file)
    }

    pub fn remove(&mut self, key: &str) -> Option<File> {
        let removed = self.files.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }
}
