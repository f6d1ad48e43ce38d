//! The JSON records stored inside a repository.
//!
//! Field names and encodings are wire-compatible with the on-disk format:
//! identifiers are 64-char lowercase hex, timestamps are RFC 3339, key
//! material is base64. Optional fields are omitted (not null) when absent.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{VaultError, VaultResult};
use crate::id::Id;

/// Repository-wide configuration, stored encrypted at object key `config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Format version. 1 never uses compression; 2 may.
    pub version: u32,
    /// Repository UUID (hex).
    pub id: String,
    /// 64-bit content-chunker polynomial, hex-encoded.
    pub chunker_polynomial: String,
}

impl RepoConfig {
    /// Reject any version this client cannot read.
    pub fn validate(&self) -> VaultResult<()> {
        match self.version {
            1 | 2 => Ok(()),
            other => Err(VaultError::UnsupportedVersion(other)),
        }
    }

    /// Whether unpacked files and blobs may be zstd-compressed.
    pub fn allows_compression(&self) -> bool {
        self.version >= 2
    }
}

/// A key file under `keys/<id-hex>`: plaintext JSON whose `data` field is
/// an authenticated envelope encrypted with the password-derived key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// KDF name; only `scrypt` is supported.
    pub kdf: String,
    #[serde(rename = "N")]
    pub n: u64,
    pub r: u32,
    pub p: u32,
    /// Base64-encoded KDF salt.
    pub salt: String,
    /// Base64-encoded envelope containing the master-key record.
    pub data: String,
}

/// The master-key record inside a key file's `data` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterKeyFile {
    pub mac: MacKeyFile,
    /// Base64-encoded 32-byte data-encryption key.
    pub encrypt: String,
}

/// The two 16-byte halves of the Poly1305-AES MAC key, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacKeyFile {
    pub k: String,
    pub r: String,
}

/// The two kinds of blob a pack can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobType {
    /// Opaque file bytes.
    Data,
    /// A serialized directory listing.
    Tree,
}

impl std::fmt::Display for BlobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobType::Data => f.write_str("data"),
            BlobType::Tree => f.write_str("tree"),
        }
    }
}

/// An index file under `index/<id-hex>`: a manifest mapping blob IDs to
/// their location inside packs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    /// Older indexes made obsolete by this one. A superseded index is
    /// never consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<Vec<Id>>,
    pub packs: Vec<IndexPack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPack {
    pub id: Id,
    pub blobs: Vec<IndexBlob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBlob {
    pub id: Id,
    #[serde(rename = "type")]
    pub blob_type: BlobType,
    /// Byte offset of the encrypted blob within its pack.
    pub offset: u64,
    /// Encrypted length, including the 16-byte IV and 16-byte tag.
    pub length: u64,
    /// Present iff the blob payload is zstd-compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressed_length: Option<u64>,
}

/// A snapshot record under `snapshots/<id-hex>`. The snapshot's own ID is
/// the object-key basename, not a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Id>,
    /// Root tree blob.
    pub tree: Id,
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludes: Option<Vec<String>>,
    /// Backup statistics, carried opaquely for presentation layers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

/// A directory listing: one tree blob decodes to this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Exact-name lookup in recorded order.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Dir,
    Symlink,
    Dev,
    Chardev,
    Fifo,
    Socket,
    Irregular,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeType::File => "file",
            NodeType::Dir => "dir",
            NodeType::Symlink => "symlink",
            NodeType::Dev => "dev",
            NodeType::Chardev => "chardev",
            NodeType::Fifo => "fifo",
            NodeType::Socket => "socket",
            NodeType::Irregular => "irregular",
        };
        f.write_str(s)
    }
}

/// One entry of a directory listing, with POSIX metadata and the
/// type-specific payload (`content` for files, `subtree` for directories,
/// `linktarget` for symlinks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub mtime: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub atime: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ctime: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inode: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Ordered data blobs whose plaintexts concatenate to the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Id>>,
    /// Tree blob holding this directory's listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linktarget: Option<String>,
}

impl Node {
    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Dir
    }

    /// The file's data blobs, empty for zero-length files.
    pub fn content(&self) -> &[Id] {
        self.content.as_deref().unwrap_or(&[])
    }
}
