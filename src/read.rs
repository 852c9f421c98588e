//! Read path: resolve a key to its most current content.
//!
//! An in-progress live buffer is considered newer than the canonical static
//! copy, so the live store is consulted first and the static store only when
//! the key is not held.

use crate::poll::{bounded_poll, ChangeListener, PollConfig};
use crate::protocol::File;
use crate::store::FileStore;
use std::ops::ControlFlow;
use std::sync::Arc;

pub struct Reader {
    static_store: Arc<FileStore>,
    live_store: Arc<FileStore>,
    poll: PollConfig,
}

impl Reader {
    pub fn new(static_store: Arc<FileStore>, live_store: Arc<FileStore>, poll: PollConfig) -> Self {
        Self {
            static_store,
            live_store,
            poll,
        }
    }

    /// Current content for `key`, preferring the live store.
    ///
    /// Re-checks within the poll budget until the resolved digest differs from
    /// `target`, then returns the last resolved file. A key found in neither
    /// store resolves to an empty file.
    pub async fn read(&self, key: &str, target: &File) -> File {
        let mut listener =
            ChangeListener::new(&[self.live_store.as_ref(), self.static_store.as_ref()]);
        let this = self;

        bounded_poll(self.poll, &mut listener, || async move {
            let resolved = this.resolve(key).await;
            if resolved.digest != target.digest {
                ControlFlow::Break(resolved)
            } else {
                ControlFlow::Continue(resolved)
            }
        })
        .await
    }

    async fn resolve(&self, key: &str) -> File {
        if let Some(live) = self.live_store.get(key).await {
            return live;
        }
        self.static_store.get(key).await.unwrap_or_default()
    }
}
