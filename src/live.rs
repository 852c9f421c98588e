//! Live store: short-lived editor buffers guarded by an advisory lock.
//!
//! A key being present means somebody holds it. The lock is informational
//! only: [`LiveStore::push`] always writes and merely reports whether the key
//! was already held, so two concurrent pushers both succeed and the later
//! write wins. Callers that need exclusivity must check the returned status.

use crate::poll::{bounded_poll, ChangeListener, PollConfig};
use crate::protocol::{File, InvalidFile, PushStatus, UnlockStatus, WatchResponse};
use crate::store::FileStore;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct LiveStore {
    store: Arc<FileStore>,
    poll: PollConfig,
}

impl LiveStore {
    pub fn new(store: Arc<FileStore>, poll: PollConfig) -> Self {
        Self { store, poll }
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    /// Report the current buffer for `key` and whether it is held.
    ///
    /// Answers early when the key is held with content other than `target`;
    /// otherwise re-checks within the poll budget and reports the last state.
    pub async fn watch(&self, key: &str, target: &File) -> WatchResponse {
        let mut listener = ChangeListener::new(&[self.store.as_ref()]);
        let store = &self.store;

        bounded_poll(self.poll, &mut listener, || async move {
            match store.get(key).await {
                Some(current) if current.digest != target.digest => {
                    ControlFlow::Break(WatchResponse {
                        target: current,
                        locked: true,
                    })
                }
                Some(current) => ControlFlow::Continue(WatchResponse {
                    target: current,
                    locked: true,
                }),
                None => ControlFlow::Continue(WatchResponse {
                    target: File::default(),
                    locked: false,
                }),
            }
        })
        .await
    }

    /// Store `updated` under `key` and report whether the key was already held.
    ///
    /// A File without content, or whose digest does not match its content,
    /// is refused and the key is left as it was.
    pub async fn push(&self, key: &str, updated: File) -> Result<PushStatus, InvalidFile> {
        if let Err(e) = updated.validate(key) {
            warn!("live: rejecting push: {}", e);
            return Err(e);
        }

        let key = key.to_string();
        let digest = updated.digest.clone();
        let status = self
            .store
            .update(|txn| match txn.insert(key.clone(), updated) {
                Some(_) => PushStatus::AlreadyHeld,
                None => PushStatus::Acquired,
            })
            .await;

        match status {
            PushStatus::Acquired => info!("live: {} acquired ({})", key, digest.short()),
            PushStatus::AlreadyHeld => debug!("live: {} updated while held ({})", key, digest.short()),
        }
        Ok(status)
    }

    /// Release `key`, discarding its buffer.
    pub async fn unlock(&self, key: &str) -> UnlockStatus {
        match self.store.remove(key).await {
            Some(_) => {
                info!("live: {} released", key);
                UnlockStatus::Released
            }
            None => {
                debug!("live: unlock of {} which is not held", key);
                UnlockStatus::NotHeld
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn live() -> LiveStore {
        LiveStore::new(Arc::new(FileStore::new()), PollConfig::live_default())
    }

    #[tokio::test]
    async fn test_push_reports_acquire_then_held() {
        let live = live();
        assert_eq!(live.push("buf", File::new("a")).await, Ok(PushStatus::Acquired));
        assert_eq!(live.push("buf", File::new("b")).await, Ok(PushStatus::AlreadyHeld));
        // Advisory only: the second write still landed.
        assert_eq!(live.store().get("buf").await, Some(File::new("b")));
    }

    #[tokio::test]
    async fn test_unlock_semantics() {
        let live = live();
        assert_eq!(live.unlock("buf").await, UnlockStatus::NotHeld);

        live.push("buf", File::new("a")).await.unwrap();
        assert!(live.store().contains("buf").await);
        assert_eq!(live.unlock("buf").await, UnlockStatus::Released);
        assert!(!live.store().contains("buf").await);
        assert_eq!(live.unlock("buf").await, UnlockStatus::NotHeld);

        assert_eq!(live.push("buf", File::new("c")).await, Ok(PushStatus::Acquired));
    }

    #[tokio::test]
    async fn test_watch_locked_iff_present() {
        let live = live();

        let response = live.watch("buf", &File::default()).await;
        assert!(!response.locked);
        assert!(response.target.is_empty());

        live.push("buf", File::new("a")).await.unwrap();
        let response = live.watch("buf", &File::default()).await;
        assert!(response.locked);
        assert_eq!(response.target, File::new("a"));

        // Same digest as the caller already has: still locked, same content.
        let response = live.watch("buf", &File::new("a").to_reference()).await;
        assert!(response.locked);
        assert_eq!(response.target, File::new("a"));

        live.unlock("buf").await;
        let response = live.watch("buf", &File::new("a").to_reference()).await;
        assert!(!response.locked);
    }

    #[tokio::test]
    async fn test_watch_waits_for_change_within_budget() {
        let store = Arc::new(FileStore::new());
        let live = Arc::new(LiveStore::new(
            store.clone(),
            PollConfig::new(3, Duration::from_secs(2)),
        ));
        live.push("buf", File::new("old")).await.unwrap();

        let pusher = live.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher.push("buf", File::new("new")).await.unwrap();
        });

        let response = live.watch("buf", &File::new("old").to_reference()).await;
        assert!(response.locked);
        assert_eq!(response.target, File::new("new"));
    }

    #[tokio::test]
    async fn test_push_refuses_invalid_buffers() {
        let live = live();
        live.push("buf", File::new("good")).await.unwrap();

        let reference = File::new("elsewhere").to_reference();
        assert_eq!(
            live.push("buf", reference).await,
            Err(InvalidFile::MissingContent("buf".into()))
        );
        let forged = File {
            content: Some(b"real".to_vec()),
            digest: crate::digest::Digest::of(b"other"),
        };
        assert_eq!(
            live.push("other", forged).await,
            Err(InvalidFile::DigestMismatch("other".into()))
        );

        assert_eq!(live.store().get("buf").await, Some(File::new("good")));
        assert!(!live.store().contains("other").await);
    }
}
