//! icevault-repo: the repository engine.
//!
//! Opens an encrypted, content-addressed backup repository over an
//! [`icevault_store::ObjectStore`], unlocks it with a password, and serves
//! reads: snapshot enumeration, tree walks, file reconstruction. Strictly
//! read-only; the engine never writes, locks, or repairs.
//!
//! Pipeline for every object: ranged or whole GET → Poly1305-AES verify +
//! AES-256-CTR decrypt → (maybe) zstd → JSON or raw bytes.

pub mod codec;
pub mod index;
pub mod keys;
pub mod pack;
pub mod read;
pub mod repository;
pub mod snapshot;
pub mod tree;

pub use index::{BlobIndex, PackLocation};
pub use pack::{PackEntry, PackReader};
pub use read::FileStream;
pub use repository::{Repository, RepositoryBuilder};
pub use tree::Browse;

/// Bounded fan-out for enumeration-time loads (index files, snapshots).
pub(crate) const FETCH_FANOUT: usize = 8;

/// Object keys the engine addresses, relative to the store root.
pub mod layout {
    use icevault_core::Id;

    pub const CONFIG: &str = "config";
    pub const KEYS_PREFIX: &str = "keys/";
    pub const SNAPSHOTS_PREFIX: &str = "snapshots/";
    pub const INDEX_PREFIX: &str = "index/";

    /// Packs shard by the first two hex chars: `data/<XX>/<id-hex>`.
    pub fn pack_key(id: &Id) -> String {
        format!("data/{}/{id}", id.hex_prefix())
    }

    /// The basename of a listed key, parsed as an identifier.
    pub fn id_from_key(key: &str) -> Option<Id> {
        let basename = key.rsplit('/').next()?;
        Id::from_hex(basename).ok()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn pack_keys_are_sharded() {
            let id = Id::from_hex(&format!("cafe{}", "00".repeat(30))).unwrap();
            assert_eq!(pack_key(&id), format!("data/ca/{id}"));
        }

        #[test]
        fn basename_parsing() {
            let id = Id::digest(b"x");
            assert_eq!(id_from_key(&format!("snapshots/{id}")), Some(id));
            assert_eq!(id_from_key(&id.to_hex()), Some(id));
            assert_eq!(id_from_key("snapshots/not-hex"), None);
        }
    }
}
