//! Directory sync client.
//!
//! One cycle walks the local tree, diffs it against the local cache, sends the
//! diff to the server and applies the corrections it returns.

pub mod apply;
pub mod cache;
pub mod client;
pub mod diff;
pub mod ignore;
pub mod session;
pub mod urls;

pub use apply::{apply_sync_response, ApplyReport};
pub use cache::{CachedFile, LocalCache};
pub use client::SyncClient;
pub use diff::{build_sync_request, Diff};
pub use ignore::{GitIgnoreFilter, PathFilter, PatternFilter};
pub use session::{CycleReport, SyncSession};
pub use urls::{build_url, normalize_path, normalize_server_url};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for one sync cycle. Any of these aborts the cycle; the next
/// tick starts over from scratch.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path is not a directory: {0}")]
    NotDirectory(String),

    #[error("Ignore check failed in {path}: {reason}")]
    Ignore { path: PathBuf, reason: String },

    #[error("Refusing unsafe path from server: {0}")]
    UnsafePath(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Unexpected reply from server: {0}")]
    UnexpectedReply(String),
}

impl SyncError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> SyncError + '_ {
        move |source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
