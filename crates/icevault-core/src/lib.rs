//! icevault-core: shared vocabulary for the icevault repository client
//!
//! This crate is intentionally small: the 32-byte content identifier, the
//! JSON records stored inside a repository, and the error taxonomy every
//! other crate speaks. No I/O, no crypto.

pub mod error;
pub mod id;
pub mod repofile;

pub use error::{ObjectKind, VaultError, VaultResult};
pub use id::Id;
pub use repofile::{
    BlobType, IndexBlob, IndexFile, IndexPack, KeyFile, MasterKeyFile, Node, NodeType, RepoConfig,
    Snapshot, Tree,
};
