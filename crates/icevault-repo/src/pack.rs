//! Pack access: materialize a blob's plaintext from its recorded
//! location, plus the tail-first pack-header parser.
//!
//! Pack layout on disk:
//!
//! ```text
//! <encrypted blob 1> … <encrypted blob N> <encrypted header> <header-length: u32 LE>
//! ```
//!
//! The hot path never touches the header; the index already knows every
//! offset. `read_header` exists for verification tooling.
//!
//! Concurrent requests for the same blob share one in-flight fetch: the
//! first caller issues the ranged GET, everyone else awaits its result.
//! Entries leave the in-flight map on completion; there is no blob cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::debug;

use icevault_core::{BlobType, Id, ObjectKind, VaultError, VaultResult};
use icevault_crypto::{open_envelope, MasterKey, OVERHEAD};
use icevault_store::ObjectStore;

use crate::index::PackLocation;
use crate::{codec, layout};

/// One parsed pack-header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub id: Id,
    pub blob_type: BlobType,
    /// Encrypted length including envelope overhead.
    pub length: u32,
    /// Present iff the payload is zstd-compressed.
    pub uncompressed_length: Option<u32>,
}

const PLAIN_ENTRY_SIZE: usize = 37;
const COMPRESSED_ENTRY_SIZE: usize = 41;
const LENGTH_FIELD_SIZE: u64 = 4;

type SharedFetch = Arc<OnceCell<Result<Bytes, Arc<VaultError>>>>;

pub struct PackReader {
    store: Arc<dyn ObjectStore>,
    master: Arc<MasterKey>,
    verify_blobs: bool,
    inflight: Mutex<HashMap<Id, SharedFetch>>,
}

impl PackReader {
    pub fn new(store: Arc<dyn ObjectStore>, master: Arc<MasterKey>, verify_blobs: bool) -> Self {
        PackReader {
            store,
            master,
            verify_blobs,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch, authenticate, decrypt, and (if compressed) expand one blob.
    ///
    /// Requests for a blob already in flight join it instead of issuing a
    /// second ranged GET.
    pub async fn read_blob(&self, id: Id, location: &PackLocation) -> VaultResult<Bytes> {
        let cell: SharedFetch = self
            .inflight
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .clone();

        let result = cell
            .get_or_init(|| async {
                self.fetch_blob(id, location).await.map_err(Arc::new)
            })
            .await
            .clone();

        // The request group is done; the next request starts fresh.
        {
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(current) = inflight.get(&id) {
                if Arc::ptr_eq(current, &cell) {
                    inflight.remove(&id);
                }
            }
        }

        result.map_err(|e| e.duplicate())
    }

    async fn fetch_blob(&self, id: Id, location: &PackLocation) -> VaultResult<Bytes> {
        let key = layout::pack_key(&location.pack);
        debug!(
            blob = %id,
            pack = %location.pack,
            offset = location.offset,
            length = location.length,
            "fetching blob"
        );

        let sealed = self
            .store
            .get_range(&key, location.offset, location.length)
            .await?;
        let plain = open_envelope(&self.master, ObjectKind::Blob, &sealed)?;
        let plain = codec::decode_blob(plain, location.uncompressed_length)?;

        if self.verify_blobs && Id::digest(&plain) != id {
            return Err(VaultError::Integrity { id });
        }
        Ok(Bytes::from(plain))
    }

    /// Parse a pack's trailing header: entry list for every blob inside.
    pub async fn read_header(&self, pack: &Id) -> VaultResult<Vec<PackEntry>> {
        let key = layout::pack_key(pack);
        let size = self.store.head(&key).await?.size;

        let minimum = LENGTH_FIELD_SIZE + OVERHEAD as u64;
        if size < minimum {
            return Err(VaultError::Format(format!(
                "pack {pack} is {size} bytes, below the {minimum}-byte minimum"
            )));
        }

        let trailer = self
            .store
            .get_range(&key, size - LENGTH_FIELD_SIZE, LENGTH_FIELD_SIZE)
            .await?;
        let header_len = u32::from_le_bytes(
            trailer[..]
                .try_into()
                .map_err(|_| VaultError::Format("pack trailer truncated".into()))?,
        ) as u64;

        if header_len < OVERHEAD as u64 || header_len + LENGTH_FIELD_SIZE > size {
            return Err(VaultError::Format(format!(
                "pack {pack} declares a {header_len}-byte header in a {size}-byte object"
            )));
        }

        let sealed = self
            .store
            .get_range(&key, size - LENGTH_FIELD_SIZE - header_len, header_len)
            .await?;
        let plain = open_envelope(&self.master, ObjectKind::PackHeader, &sealed)?;
        parse_header(&plain)
    }
}

/// Decode the fixed-size entry sequence of a decrypted pack header.
///
/// Entry shapes: `type(1) | length(4 LE) | id(32)` for plain entries
/// (types 0 = data, 1 = tree) and `type(1) | length(4 LE) |
/// uncompressed-length(4 LE) | id(32)` for compressed ones (2 = data,
/// 3 = tree).
pub fn parse_header(plain: &[u8]) -> VaultResult<Vec<PackEntry>> {
    let mut entries = Vec::new();
    let mut rest = plain;

    while let Some(&entry_type) = rest.first() {
        let (blob_type, entry_size, compressed) = match entry_type {
            0 => (BlobType::Data, PLAIN_ENTRY_SIZE, false),
            1 => (BlobType::Tree, PLAIN_ENTRY_SIZE, false),
            2 => (BlobType::Data, COMPRESSED_ENTRY_SIZE, true),
            3 => (BlobType::Tree, COMPRESSED_ENTRY_SIZE, true),
            other => {
                return Err(VaultError::Format(format!(
                    "unknown pack entry type {other}"
                )))
            }
        };
        if rest.len() < entry_size {
            return Err(VaultError::Format(format!(
                "truncated pack header entry: {} bytes left, need {entry_size}",
                rest.len()
            )));
        }

        let length = u32::from_le_bytes(rest[1..5].try_into().expect("4-byte slice"));
        let (uncompressed_length, id_bytes) = if compressed {
            let uncompressed = u32::from_le_bytes(rest[5..9].try_into().expect("4-byte slice"));
            (Some(uncompressed), &rest[9..41])
        } else {
            (None, &rest[5..37])
        };

        let mut id = [0u8; Id::LEN];
        id.copy_from_slice(id_bytes);
        entries.push(PackEntry {
            id: Id::from_bytes(id),
            blob_type,
            length,
            uncompressed_length,
        });
        rest = &rest[entry_size..];
    }

    Ok(entries)
}
