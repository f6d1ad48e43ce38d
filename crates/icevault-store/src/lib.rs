//! icevault-store: the narrow storage capability the engine consumes.
//!
//! The engine addresses a repository through exactly four operations:
//! list, full get, ranged get, and head. `S3Store` implements them over
//! OpenDAL against any S3-compatible endpoint; `MemoryStore` backs tests
//! and embedded fixtures. This is the only polymorphic boundary in the
//! client.

pub mod config;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use icevault_core::VaultResult;

pub use config::StoreConfig;
pub use memory::MemoryStore;
pub use s3::S3Store;

/// Metadata returned by [`ObjectStore::head`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
}

/// Read-only access to an opaque bucket, rooted at a caller-supplied
/// prefix. All failures surface as `VaultError::Transport` carrying the
/// offending key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All object keys under `prefix`, pagination followed to exhaustion.
    /// Keys are returned relative to the store root (e.g. `keys/ab12…`).
    async fn list(&self, prefix: &str) -> VaultResult<Vec<String>>;

    /// The whole object at `key`.
    async fn get(&self, key: &str) -> VaultResult<Bytes>;

    /// Exactly `length` bytes starting at `offset`.
    ///
    /// Implementations must deliver the precise window: a backend that
    /// ignores range requests and answers with the full object is
    /// truncated here, and a short read is an error, never a short
    /// return.
    async fn get_range(&self, key: &str, offset: u64, length: u64) -> VaultResult<Bytes>;

    /// Object metadata without the body.
    async fn head(&self, key: &str) -> VaultResult<ObjectMeta>;
}
