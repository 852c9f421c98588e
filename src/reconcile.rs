//! Server-side reconciliation of a client's sync request against the static store.
//!
//! Step one applies the client's additions, edits and removals inside a single
//! store transaction. Step two repeatedly compares the client's unmodified
//! paths and the rest of the store with what the client claims to hold,
//! answering as soon as there is something to correct.

use crate::poll::{bounded_poll, ChangeListener, PollConfig};
use crate::protocol::{File, InvalidFile, SyncRequest, SyncResponse};
use crate::store::{FileStore, StoreTxn, StoreView};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Corrections accumulated while handling one request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Corrections {
    update: BTreeMap<String, File>,
    delete: BTreeSet<String>,
}

impl Corrections {
    fn is_empty(&self) -> bool {
        self.update.is_empty() && self.delete.is_empty()
    }

    fn into_response(self) -> SyncResponse {
        SyncResponse {
            update: self.update,
            delete: self.delete.into_iter().collect(),
        }
    }
}

pub struct Reconciler {
    store: Arc<FileStore>,
    poll: PollConfig,
}

impl Reconciler {
    pub fn new(store: Arc<FileStore>, poll: PollConfig) -> Self {
        Self { store, poll }
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Merge `request` into the store and compute what the client must pull or delete.
    ///
    /// A request carrying an added or changed File without content, or with
    /// a digest that does not match its content, is refused whole and leaves
    /// the store untouched.
    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, InvalidFile> {
        if let Err(e) = request.validate() {
            warn!("sync: rejecting request: {}", e);
            return Err(e);
        }

        let conflicts = self
            .store
            .update(|txn| apply_client_writes(txn, request))
            .await;

        if !conflicts.is_empty() {
            debug!(
                "{} added/removed path(s) lost to the stored version",
                conflicts.len()
            );
        }

        // Subscribe after our own writes so they do not wake us.
        let mut listener = ChangeListener::new(&[self.store.as_ref()]);
        let store = &self.store;
        let conflicts = &conflicts;

        let corrections = bounded_poll(self.poll, &mut listener, || async move {
            let mut corrections = Corrections {
                update: conflicts.clone(),
                delete: BTreeSet::new(),
            };
            store
                .inspect(|view| scan_for_corrections(view, request, &mut corrections))
                .await;

            if corrections.is_empty() {
                ControlFlow::Continue(corrections)
            } else {
                ControlFlow::Break(corrections)
            }
        })
        .await;

        if !corrections.is_empty() {
            info!(
                "sync: {} update(s), {} delete(s) for client ({} added, {} changed, {} unmodified, {} removed)",
                corrections.update.len(),
                corrections.delete.len(),
                request.added.len(),
                request.changed.len(),
                request.unmod.len(),
                request.removed.len()
            );
        }

        Ok(corrections.into_response())
    }
}

/// Step one: apply the client's asserted writes.
///
/// Returns the stored files the client must take instead of its own version.
fn apply_client_writes(txn: &mut StoreTxn<'_>, request: &SyncRequest) -> BTreeMap<String, File> {
    let mut conflicts = BTreeMap::new();

    for (path, file) in &request.added {
        match txn.get(path) {
            Some(existing) => {
                if existing.digest != file.digest {
                    debug!("add of {} lost to stored {}", path, existing.digest.short());
                }
                conflicts.insert(path.clone(), existing.clone());
            }
            None => {
                info!("adopting new path {}", path);
                txn.insert(path.clone(), file.clone());
            }
        }
    }

    for (path, file) in &request.changed {
        info!("overwriting {} with client edit {}", path, file.digest.short());
        txn.insert(path.clone(), file.clone());
    }

    for (path, last_known) in &request.removed {
        let Some(existing) = txn.get(path) else {
            continue;
        };
        if existing.digest == last_known.digest {
            info!("removing {} (deleted by client)", path);
            txn.remove(path);
        } else {
            debug!("deletion of {} lost to newer stored version", path);
            conflicts.insert(path.clone(), existing.clone());
        }
    }

    conflicts
}

/// Step two: find paths the client is stale on, has extra, or is missing.
fn scan_for_corrections(
    view: &StoreView<'_>,
    request: &SyncRequest,
    corrections: &mut Corrections,
) {
    for (path, claimed) in &request.unmod {
        match view.get(path) {
            None => {
                corrections.delete.insert(path.clone());
            }
            Some(stored) if stored.digest != claimed.digest => {
                corrections.update.insert(path.clone(), stored.clone());
            }
            Some(_) => {}
        }
    }

    for (path, stored) in view.iter() {
        if !request.mentions(path) {
            corrections.update.insert(path.clone(), stored.clone());
        }
    }
}
