//! Bounded re-polling of shared stores.
//!
//! Reconciliation, watch and read all re-check shared state a fixed number of
//! times before answering, giving concurrent requests a short window to land.
//! Between attempts the poller waits for at most `interval`, waking early when
//! any watched store commits a mutation. No store lock is held while waiting.

use crate::store::FileStore;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;

/// Default attempts for `sync` and `read`.
pub const STATIC_POLL_ATTEMPTS: u32 = 3;
/// Default maximum wait between `sync`/`read` attempts.
pub const STATIC_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default attempts for `watch`: a single point-in-time check.
pub const LIVE_POLL_ATTEMPTS: u32 = 1;
pub const LIVE_POLL_INTERVAL: Duration = Duration::ZERO;

/// Retry budget for one bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Number of checks; zero is treated as one.
    pub attempts: u32,
    /// Longest wait between two checks.
    pub interval: Duration,
}

impl PollConfig {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    pub const fn static_default() -> Self {
        Self::new(STATIC_POLL_ATTEMPTS, STATIC_POLL_INTERVAL)
    }

    pub const fn live_default() -> Self {
        Self::new(LIVE_POLL_ATTEMPTS, LIVE_POLL_INTERVAL)
    }

    /// Answer after one check, never waiting.
    pub const fn immediate() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::static_default()
    }
}

/// Wakes a poller when any of a set of stores changes.
pub struct ChangeListener {
    receivers: Vec<watch::Receiver<u64>>,
}

impl ChangeListener {
    /// Listen for mutations committed to `stores` from now on.
    pub fn new(stores: &[&FileStore]) -> Self {
        Self {
            receivers: stores.iter().map(|store| store.subscribe()).collect(),
        }
    }

    /// Wait until a watched store changes or `timeout` elapses.
    /// Returns true if woken by a change.
    pub async fn wait(&mut self, timeout: Duration) -> bool {
        if self.receivers.is_empty() || timeout.is_zero() {
            if !timeout.is_zero() {
                tokio::time::sleep(timeout).await;
            }
            return false;
        }

        let mut changed: FuturesUnordered<_> =
            self.receivers.iter_mut().map(|rx| rx.changed()).collect();
        match tokio::time::timeout(timeout, changed.next()).await {
            Ok(Some(Ok(()))) => true,
            // Sender gone: the store was dropped, nothing more will change.
            Ok(Some(Err(_))) | Ok(None) => false,
            Err(_) => false,
        }
    }
}

/// Run `attempt` up to `config.attempts` times.
///
/// `attempt` returns `Break` to answer immediately or `Continue` to keep
/// polling; the value of the last `Continue` is returned once the budget is
/// spent.
pub async fn bounded_poll<T, F, Fut>(
    config: PollConfig,
    listener: &mut ChangeListener,
    mut attempt: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<T, T>>,
{
    let attempts = config.attempts.max(1);
    let mut round = 1;
    loop {
        match attempt().await {
            ControlFlow::Break(value) => return value,
            ControlFlow::Continue(value) => {
                if round >= attempts {
                    return value;
                }
            }
        }
        listener.wait(config.interval).await;
        round += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::File;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_break_stops_immediately() {
        let store = FileStore::new();
        let mut listener = ChangeListener::new(&[&store]);
        let calls = AtomicU32::new(0);

        let value = bounded_poll(PollConfig::new(5, Duration::from_secs(10)), &mut listener, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ControlFlow::Break(7) }
        })
        .await;

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_value() {
        let store = FileStore::new();
        let mut listener = ChangeListener::new(&[&store]);
        let calls = AtomicU32::new(0);

        let value = bounded_poll(PollConfig::new(3, Duration::from_millis(5)), &mut listener, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { ControlFlow::<u32, u32>::Continue(n) }
        })
        .await;

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_checks_once() {
        let mut listener = ChangeListener::new(&[]);
        let value = bounded_poll(PollConfig::new(0, Duration::from_secs(10)), &mut listener, || async {
            ControlFlow::<&str, &str>::Continue("checked")
        })
        .await;
        assert_eq!(value, "checked");
    }

    #[tokio::test]
    async fn test_mutation_wakes_waiter_early() {
        let store = Arc::new(FileStore::new());
        let mut listener = ChangeListener::new(&[store.as_ref()]);

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.insert("k", File::new("v")).await;
        });

        let started = Instant::now();
        let woke = listener.wait(Duration::from_secs(10)).await;
        assert!(woke);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_wait_times_out_without_changes() {
        let store = FileStore::new();
        let mut listener = ChangeListener::new(&[&store]);
        assert!(!listener.wait(Duration::from_millis(10)).await);
    }
}
