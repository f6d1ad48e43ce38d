//! The in-memory blob index: blob ID → location inside a pack.
//!
//! Built from every non-superseded file under `index/`. Two passes over
//! the decoded files: first collect the union of `supersedes` sets, then
//! insert the blobs of every index not named there. A blob listed by two
//! live indexes resolves to one entry; both point at identical content.
//!
//! Unreadable index files are logged and skipped so one bad object does
//! not deny access to the rest; the build only fails when files exist but
//! none loads.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use icevault_core::{BlobType, Id, IndexFile, ObjectKind, RepoConfig, VaultError, VaultResult};
use icevault_crypto::{open_envelope, MasterKey};
use icevault_store::ObjectStore;

use crate::{codec, layout, FETCH_FANOUT};

/// Where one blob lives: which pack, where inside it, and how to decode
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackLocation {
    pub pack: Id,
    pub blob_type: BlobType,
    /// Byte offset of the encrypted blob within the pack.
    pub offset: u64,
    /// Encrypted length including envelope overhead.
    pub length: u64,
    /// Present iff the payload is zstd-compressed.
    pub uncompressed_length: Option<u64>,
}

pub struct BlobIndex {
    blobs: HashMap<Id, PackLocation>,
}

impl BlobIndex {
    /// Load and merge all live index files.
    pub async fn load(
        store: &dyn ObjectStore,
        master: &MasterKey,
        config: &RepoConfig,
    ) -> VaultResult<Self> {
        let keys = store.list(layout::INDEX_PREFIX).await?;

        let mut loaded: Vec<(Id, IndexFile)> = Vec::with_capacity(keys.len());
        let mut last_err = None;

        let mut pending = Vec::with_capacity(keys.len());
        for key in &keys {
            pending.push(fetch_one(store, master, config, key));
        }
        let mut fetches = stream::iter(pending).buffer_unordered(FETCH_FANOUT);

        while let Some((key, result)) = fetches.next().await {
            match result {
                Ok(file) => loaded.push(file),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping unreadable index file");
                    last_err = Some(e);
                }
            }
        }

        if loaded.is_empty() {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        // Pass one: union of everything declared obsolete.
        let mut superseded: HashSet<Id> = HashSet::new();
        for (_, file) in &loaded {
            if let Some(ids) = &file.supersedes {
                superseded.extend(ids.iter().copied());
            }
        }

        // Pass two: merge the blobs of every live index.
        let capacity = loaded
            .iter()
            .filter(|(id, _)| !superseded.contains(id))
            .flat_map(|(_, f)| f.packs.iter())
            .map(|p| p.blobs.len())
            .sum();
        let mut blobs: HashMap<Id, PackLocation> = HashMap::with_capacity(capacity);

        for (index_id, file) in loaded {
            if superseded.contains(&index_id) {
                debug!(index = %index_id, "ignoring superseded index");
                continue;
            }
            for pack in file.packs {
                for blob in pack.blobs {
                    let location = PackLocation {
                        pack: pack.id,
                        blob_type: blob.blob_type,
                        offset: blob.offset,
                        length: blob.length,
                        uncompressed_length: blob.uncompressed_length,
                    };
                    if let Some(previous) = blobs.insert(blob.id, location) {
                        let current = &blobs[&blob.id];
                        if previous != *current {
                            debug!(
                                blob = %blob.id,
                                "live indexes disagree on blob location; keeping the later entry"
                            );
                        }
                    }
                }
            }
        }

        debug!(blobs = blobs.len(), "blob index built");
        Ok(BlobIndex { blobs })
    }

    /// Look up a blob of the expected type.
    pub fn find(&self, id: &Id, expected: BlobType) -> VaultResult<&PackLocation> {
        let location = self
            .blobs
            .get(id)
            .ok_or(VaultError::BlobNotFound(*id))?;
        if location.blob_type != expected {
            return Err(VaultError::BlobTypeMismatch {
                id: *id,
                expected,
                actual: location.blob_type,
            });
        }
        Ok(location)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.blobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Every pack referenced by a live index entry, deduplicated.
    pub fn packs(&self) -> Vec<Id> {
        let mut packs: Vec<Id> = self.blobs.values().map(|l| l.pack).collect();
        packs.sort();
        packs.dedup();
        packs
    }

    /// All blobs recorded inside one pack, ordered by offset.
    pub fn blobs_in_pack(&self, pack: &Id) -> Vec<(Id, &PackLocation)> {
        let mut blobs: Vec<(Id, &PackLocation)> = self
            .blobs
            .iter()
            .filter(|(_, l)| l.pack == *pack)
            .map(|(id, l)| (*id, l))
            .collect();
        blobs.sort_by_key(|(_, l)| l.offset);
        blobs
    }
}

async fn fetch_one<'a>(
    store: &dyn ObjectStore,
    master: &MasterKey,
    config: &RepoConfig,
    key: &'a str,
) -> (&'a str, VaultResult<(Id, IndexFile)>) {
    (key, load_index_file(store, master, config, key).await)
}

async fn load_index_file(
    store: &dyn ObjectStore,
    master: &MasterKey,
    config: &RepoConfig,
    key: &str,
) -> VaultResult<(Id, IndexFile)> {
    let id = layout::id_from_key(key)
        .ok_or_else(|| VaultError::Format(format!("index key {key:?} has no identifier")))?;
    let body = store.get(key).await?;
    let plain = open_envelope(master, ObjectKind::Index, &body)?;
    let decoded = codec::decode_unpacked(config.version, plain)?;
    let file: IndexFile = serde_json::from_slice(&decoded)
        .map_err(|e| VaultError::Format(format!("index {id}: {e}")))?;
    Ok((id, file))
}
