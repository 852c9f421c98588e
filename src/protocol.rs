//! Request and response bodies exchanged between sync clients and the server.
//!
//! Every endpoint takes one JSON body and returns one JSON body (or a plain
//! status line for `push`/`unlock`).

use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// File content plus its digest.
///
/// A File without content is a *reference*: it asserts "I already have the
/// content with this digest" without resending the bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(
        default,
        with = "crate::b64::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<Vec<u8>>,
    #[serde(default)]
    pub digest: Digest,
}

impl File {
    /// Build a full File, computing the digest of `content`.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let digest = Digest::of(&content);
        Self {
            content: Some(content),
            digest,
        }
    }

    /// Build a reference to content the sender already holds.
    pub fn reference(digest: Digest) -> Self {
        Self {
            content: None,
            digest,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.content.is_none()
    }

    /// True for the placeholder returned when a key resolves to nothing.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.digest.is_empty()
    }

    /// A reference to this file's content.
    pub fn to_reference(&self) -> Self {
        Self::reference(self.digest.clone())
    }

    /// Check that the carried content actually hashes to the carried digest.
    /// References are trivially consistent.
    pub fn is_consistent(&self) -> bool {
        match &self.content {
            Some(content) => Digest::of(content) == self.digest,
            None => true,
        }
    }

    /// Check a File a client wants stored under `path`: it must carry
    /// content, and that content must hash to the carried digest.
    pub fn validate(&self, path: &str) -> Result<(), InvalidFile> {
        if self.is_reference() {
            return Err(InvalidFile::MissingContent(path.to_string()));
        }
        if !self.is_consistent() {
            return Err(InvalidFile::DigestMismatch(path.to_string()));
        }
        Ok(())
    }
}

/// A client sent a File that cannot be stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidFile {
    #[error("{0}: content missing")]
    MissingContent(String),

    #[error("{0}: digest does not match content")]
    DigestMismatch(String),
}

/// A client's three-way (plus removals) view of its directory against its cache.
///
/// The maps are disjoint: each tracked path appears in exactly one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Paths new to the client's cache, with full content.
    #[serde(default)]
    pub added: BTreeMap<String, File>,
    /// Paths whose content changed since the cache entry, with full content.
    #[serde(default)]
    pub changed: BTreeMap<String, File>,
    /// Paths believed current, as references.
    #[serde(default)]
    pub unmod: BTreeMap<String, File>,
    /// Paths the client had cached but no longer has on disk, as references
    /// to the last digest it knew.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub removed: BTreeMap<String, File>,
}

impl SyncRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the request mentions `path` in any of its maps.
    pub fn mentions(&self, path: &str) -> bool {
        self.added.contains_key(path)
            || self.changed.contains_key(path)
            || self.unmod.contains_key(path)
            || self.removed.contains_key(path)
    }

    /// Total number of paths described by the request.
    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.unmod.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every File the client asks the server to store.
    pub fn validate(&self) -> Result<(), InvalidFile> {
        self.added
            .iter()
            .chain(&self.changed)
            .try_for_each(|(path, file)| file.validate(path))
    }
}

/// Corrections the client must apply to converge with the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Paths to write, with full content.
    #[serde(default)]
    pub update: BTreeMap<String, File>,
    /// Paths to remove.
    #[serde(default)]
    pub delete: Vec<String>,
}

impl SyncResponse {
    pub fn is_empty(&self) -> bool {
        self.update.is_empty() && self.delete.is_empty()
    }
}

/// Body of `POST /read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub key: String,
    /// The version the caller already has; only its digest is consulted.
    #[serde(default)]
    pub target: File,
}

/// Body of `POST /watch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    pub key: String,
    #[serde(default)]
    pub target: File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchResponse {
    pub target: File,
    /// Whether the key is currently present (held) in the live store.
    pub locked: bool,
}

/// Body of `POST /push`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub key: String,
    pub updated: File,
}

/// Body of `POST /unlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub key: String,
}

/// Outcome of a push, reported to the caller as a plain status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    /// The key was free; the pusher now holds it.
    Acquired,
    /// Someone already held the key. The write happened anyway.
    AlreadyHeld,
}

impl PushStatus {
    pub const ACQUIRED: &'static str = "push lock acquired";
    pub const ALREADY_HELD: &'static str = "push lock present";

    pub fn as_str(&self) -> &'static str {
        match self {
            PushStatus::Acquired => Self::ACQUIRED,
            PushStatus::AlreadyHeld => Self::ALREADY_HELD,
        }
    }

    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            Self::ACQUIRED => Some(PushStatus::Acquired),
            Self::ALREADY_HELD => Some(PushStatus::AlreadyHeld),
            _ => None,
        }
    }
}

impl fmt::Display for PushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an unlock, reported as a plain status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockStatus {
    Released,
    /// Nothing to unlock.
    NotHeld,
}

impl UnlockStatus {
    pub const RELEASED: &'static str = "unlock success";
    pub const NOT_HELD: &'static str = "unlock failed";

    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockStatus::Released => Self::RELEASED,
            UnlockStatus::NotHeld => Self::NOT_HELD,
        }
    }

    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            Self::RELEASED => Some(UnlockStatus::Released),
            Self::NOT_HELD => Some(UnlockStatus::NotHeld),
            _ => None,
        }
    }
}

impl fmt::Display for UnlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
