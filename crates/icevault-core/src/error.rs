//! Error taxonomy shared by every icevault crate.
//!
//! Security-sensitive failures deliberately share one user-visible message:
//! a failed MAC and a wrong password both render as "wrong password or
//! corrupted data", so callers cannot tell integrity faults from decoding
//! faults.

use thiserror::Error;

use crate::id::Id;
use crate::repofile::BlobType;

pub type VaultResult<T> = Result<T, VaultError>;

/// What was being decrypted or decoded when an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Config,
    Key,
    Index,
    Snapshot,
    Blob,
    PackHeader,
    Link,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectKind::Config => "config",
            ObjectKind::Key => "key",
            ObjectKind::Index => "index",
            ObjectKind::Snapshot => "snapshot",
            ObjectKind::Blob => "blob",
            ObjectKind::PackHeader => "pack header",
            ObjectKind::Link => "link",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    /// A failure surfaced by the object store; carries the offending key.
    #[error("object store error for {key:?}: {source}")]
    Transport {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// MAC verification failed on an authenticated envelope.
    #[error("wrong password or corrupted data (reading {0})")]
    Authentication(ObjectKind),

    /// No key file accepted the supplied password; carries the last
    /// per-key failure, never the full list of tried files.
    #[error("wrong password or corrupted data")]
    BadPassword(#[source] Box<VaultError>),

    #[error("repository has no key files")]
    NoKeys,

    #[error("unsupported repository version {0}")]
    UnsupportedVersion(u32),

    /// Malformed JSON, bad encoding byte, truncated envelope, bad pack
    /// structure.
    #[error("malformed repository data: {0}")]
    Format(String),

    #[error("blob {0} is not present in any live index")]
    BlobNotFound(Id),

    #[error("blob {id} is recorded as {actual}, expected {expected}")]
    BlobTypeMismatch {
        id: Id,
        expected: BlobType,
        actual: BlobType,
    },

    #[error("path not found: {0:?}")]
    PathNotFound(String),

    #[error("not a directory: {0:?}")]
    NotADirectory(String),

    #[error("not a file: {0:?}")]
    NotAFile(String),

    /// Plaintext of a blob does not hash to its identifier.
    #[error("blob {id} content does not match its identifier")]
    Integrity { id: Id },

    #[error("file length {actual} does not match recorded size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("zstd decompression failed: {0}")]
    Decompression(String),

    /// Client-side configuration problems (bad endpoint, missing
    /// credentials); never caused by repository contents.
    #[error("config error: {0}")]
    Config(String),
}

impl VaultError {
    /// Rebuild an equivalent error from a shared reference.
    ///
    /// Used when one in-flight failure must be delivered to several
    /// waiters. Variants carrying a non-cloneable cause keep its rendered
    /// message.
    pub fn duplicate(&self) -> VaultError {
        match self {
            VaultError::Transport { key, source } => VaultError::Transport {
                key: key.clone(),
                source: source.to_string().into(),
            },
            VaultError::Authentication(kind) => VaultError::Authentication(*kind),
            VaultError::BadPassword(inner) => VaultError::BadPassword(Box::new(inner.duplicate())),
            VaultError::NoKeys => VaultError::NoKeys,
            VaultError::UnsupportedVersion(v) => VaultError::UnsupportedVersion(*v),
            VaultError::Format(msg) => VaultError::Format(msg.clone()),
            VaultError::BlobNotFound(id) => VaultError::BlobNotFound(*id),
            VaultError::BlobTypeMismatch {
                id,
                expected,
                actual,
            } => VaultError::BlobTypeMismatch {
                id: *id,
                expected: *expected,
                actual: *actual,
            },
            VaultError::PathNotFound(p) => VaultError::PathNotFound(p.clone()),
            VaultError::NotADirectory(p) => VaultError::NotADirectory(p.clone()),
            VaultError::NotAFile(p) => VaultError::NotAFile(p.clone()),
            VaultError::Integrity { id } => VaultError::Integrity { id: *id },
            VaultError::SizeMismatch { expected, actual } => VaultError::SizeMismatch {
                expected: *expected,
                actual: *actual,
            },
            VaultError::Decompression(msg) => VaultError::Decompression(msg.clone()),
            VaultError::Config(msg) => VaultError::Config(msg.clone()),
        }
    }

    /// Build a transport error for a store operation on `key`.
    pub fn transport(
        key: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> VaultError {
        VaultError::Transport {
            key: key.into(),
            source: source.into(),
        }
    }
}
