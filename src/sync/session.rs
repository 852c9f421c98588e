//! One client's sync loop: diff, exchange, apply, repeat.

use crate::sync::apply::apply_sync_response;
use crate::sync::cache::LocalCache;
use crate::sync::client::SyncClient;
use crate::sync::diff::build_sync_request;
use crate::sync::ignore::PathFilter;
use crate::sync::SyncError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default period between sync cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(50);

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub added: usize,
    pub changed: usize,
    pub unmodified: usize,
    pub removed: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CycleReport {
    /// True if the cycle moved any content in either direction.
    pub fn is_quiet(&self) -> bool {
        self.added == 0
            && self.changed == 0
            && self.removed == 0
            && self.updated == 0
            && self.deleted == 0
    }
}

pub struct SyncSession {
    base: PathBuf,
    cache: LocalCache,
    filter: Box<dyn PathFilter>,
    client: SyncClient,
}

impl SyncSession {
    pub fn new(base: impl Into<PathBuf>, filter: Box<dyn PathFilter>, client: SyncClient) -> Self {
        Self {
            base: base.into(),
            cache: LocalCache::new(),
            filter,
            client,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Run one Diff -> exchange -> Apply cycle.
    ///
    /// The cache only advances once the server has answered, so a failed
    /// exchange leaves it exactly as it was and the next cycle resends.
    pub async fn run_once(&mut self) -> Result<CycleReport, SyncError> {
        let diff = build_sync_request(&self.base, &self.cache, self.filter.as_mut())?;
        let request = diff.request;

        let response = self.client.sync(&request).await?;
        self.cache = diff.cache;

        let applied = apply_sync_response(&response, &self.base, &mut self.cache)?;

        Ok(CycleReport {
            added: request.added.len(),
            changed: request.changed.len(),
            unmodified: request.unmod.len(),
            removed: request.removed.len(),
            updated: applied.written.len(),
            deleted: applied.deleted.len(),
        })
    }

    /// Run cycles every `interval`, forever. A failed cycle is logged and the
    /// next tick starts from scratch.
    pub async fn run(mut self, interval: Duration) {
        info!(
            "syncing {} with {} every {:?}",
            self.base.display(),
            self.client.server(),
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;

        loop {
            ticker.tick().await;
            cycle += 1;
            match self.run_once().await {
                Ok(report) if report.is_quiet() => {
                    debug!("cycle {}: in sync ({} files)", cycle, report.unmodified)
                }
                Ok(report) => info!(
                    "cycle {}: sent {} added, {} changed, {} removed; applied {} updates, {} deletes",
                    cycle,
                    report.added,
                    report.changed,
                    report.removed,
                    report.updated,
                    report.deleted
                ),
                Err(e) => warn!("cycle {} aborted: {}", cycle, e),
            }
        }
    }
}
