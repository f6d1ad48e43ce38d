//! Shared test fixture: builds complete encrypted repositories in memory
//! with the same primitives the engine later decrypts with.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use secrecy::SecretString;
use serde_json::json;
use time::OffsetDateTime;

use icevault_core::{
    BlobType, Id, IndexBlob, IndexFile, IndexPack, Node, NodeType, RepoConfig, Snapshot, Tree,
    VaultResult,
};
use icevault_crypto::{derive_user_key, seal_envelope, MasterKey, ScryptParams};
use icevault_store::{MemoryStore, ObjectMeta, ObjectStore};

/// The password the default key file accepts.
pub const PASSWORD: &str = "correct horse";

/// scrypt parameters for the default key file.
pub const KDF_N: u64 = 16384;
pub const KDF_R: u32 = 8;
pub const KDF_P: u32 = 1;

pub struct Fixture {
    pub store: MemoryStore,
    pub master: MasterKey,
    pub version: u32,
    iv_counter: u64,
}

impl Fixture {
    /// An empty repository shell: config written, no keys yet.
    pub fn new(version: u32) -> Self {
        let mut fx = Fixture {
            store: MemoryStore::new(),
            master: MasterKey::from_okm(&okm_pattern()),
            version,
            iv_counter: 1,
        };
        fx.write_config();
        fx
    }

    /// Config + default key file; ready to open with [`PASSWORD`].
    pub fn ready(version: u32) -> Self {
        let mut fx = Fixture::new(version);
        fx.write_default_key_file();
        fx
    }

    pub fn password() -> SecretString {
        SecretString::from(PASSWORD)
    }

    fn next_iv(&mut self) -> [u8; 16] {
        self.iv_counter += 1;
        let mut iv = [0u8; 16];
        iv[..8].copy_from_slice(&self.iv_counter.to_be_bytes());
        iv
    }

    fn write_config(&mut self) {
        let config = RepoConfig {
            version: self.version,
            id: Id::digest(b"fixture repository").to_hex(),
            chunker_polynomial: "25b468838dcb75".into(),
        };
        let body = serde_json::to_vec(&config).unwrap();
        let iv = self.next_iv();
        self.store
            .insert("config", seal_envelope(&self.master, &iv, &body));
    }

    /// Overwrite `config` with an arbitrary version number.
    pub fn write_config_version(&mut self, version: u32) {
        self.version = version;
        self.write_config();
    }

    pub fn write_default_key_file(&mut self) -> Id {
        self.write_key_file(PASSWORD, KDF_N, &[0xAA; 32])
    }

    /// A key file unlockable by `password`.
    pub fn write_key_file(&mut self, password: &str, n: u64, salt: &[u8; 32]) -> Id {
        let params = ScryptParams { n, r: KDF_R, p: KDF_P };
        let user_key =
            derive_user_key(&SecretString::from(password), salt, &params).unwrap();

        let record = json!({
            "mac": {
                "k": BASE64.encode(self.master.mac_k()),
                "r": BASE64.encode(self.master.mac_r()),
            },
            "encrypt": BASE64.encode(self.master.encrypt_key()),
        });
        let iv = self.next_iv();
        let sealed = seal_envelope(&user_key, &iv, record.to_string().as_bytes());

        let body = serde_json::to_vec(&json!({
            "created": "2024-01-02T03:04:05Z",
            "username": "alice",
            "hostname": "backup-host",
            "kdf": "scrypt",
            "N": n,
            "r": KDF_R,
            "p": KDF_P,
            "salt": BASE64.encode(salt),
            "data": BASE64.encode(sealed),
        }))
        .unwrap();

        let id = Id::digest(&body);
        self.store.insert(format!("keys/{id}"), body);
        id
    }

    pub fn pack(&mut self) -> PackBuilder<'_> {
        PackBuilder {
            fx: self,
            body: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Write an index file; payload is zstd-framed when `compress` is set
    /// (version-2 repositories only).
    pub fn write_index(
        &mut self,
        supersedes: Option<Vec<Id>>,
        packs: Vec<IndexPack>,
        compress: bool,
    ) -> Id {
        let file = IndexFile { supersedes, packs };
        let mut body = serde_json::to_vec(&file).unwrap();
        if compress {
            let mut framed = vec![0x02];
            framed.extend(zstd::encode_all(&body[..], 0).unwrap());
            body = framed;
        }
        let iv = self.next_iv();
        let sealed = seal_envelope(&self.master, &iv, &body);
        let id = Id::digest(&sealed);
        self.store.insert(format!("index/{id}"), sealed);
        id
    }

    pub fn write_snapshot(&mut self, snapshot: &Snapshot) -> Id {
        let body = serde_json::to_vec(snapshot).unwrap();
        let iv = self.next_iv();
        let sealed = seal_envelope(&self.master, &iv, &body);
        let id = Id::digest(&sealed);
        self.store.insert(format!("snapshots/{id}"), sealed);
        id
    }

    pub fn store_arc(&self) -> Arc<dyn ObjectStore> {
        Arc::new(self.store.clone())
    }
}

fn okm_pattern() -> [u8; 64] {
    let mut okm = [0u8; 64];
    for (i, b) in okm.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(37).wrapping_add(11);
    }
    okm
}

pub struct PackBuilder<'a> {
    fx: &'a mut Fixture,
    body: Vec<u8>,
    entries: Vec<(Id, BlobType, u64, u64, Option<u64>)>,
}

impl PackBuilder<'_> {
    /// Append one encrypted blob; returns its content identifier.
    pub fn add_blob(&mut self, blob_type: BlobType, plaintext: &[u8], compress: bool) -> Id {
        let id = Id::digest(plaintext);
        let payload = if compress {
            zstd::encode_all(plaintext, 0).unwrap()
        } else {
            plaintext.to_vec()
        };
        let iv = self.fx.next_iv();
        let sealed = seal_envelope(&self.fx.master, &iv, &payload);

        let offset = self.body.len() as u64;
        let length = sealed.len() as u64;
        let uncompressed = compress.then(|| plaintext.len() as u64);
        self.body.extend_from_slice(&sealed);
        self.entries.push((id, blob_type, offset, length, uncompressed));
        id
    }

    pub fn add_data(&mut self, plaintext: &[u8]) -> Id {
        self.add_blob(BlobType::Data, plaintext, false)
    }

    pub fn add_tree(&mut self, tree: &Tree) -> Id {
        let body = serde_json::to_vec(tree).unwrap();
        self.add_blob(BlobType::Tree, &body, false)
    }

    /// Seal the header, append the length trailer, store the pack, and
    /// return its index record.
    pub fn finish(mut self) -> IndexPack {
        let mut header = Vec::new();
        for (id, blob_type, _, length, uncompressed) in &self.entries {
            let type_byte = match (*blob_type, uncompressed.is_some()) {
                (BlobType::Data, false) => 0u8,
                (BlobType::Tree, false) => 1,
                (BlobType::Data, true) => 2,
                (BlobType::Tree, true) => 3,
            };
            header.push(type_byte);
            header.extend_from_slice(&(*length as u32).to_le_bytes());
            if let Some(u) = uncompressed {
                header.extend_from_slice(&(*u as u32).to_le_bytes());
            }
            header.extend_from_slice(id.as_bytes());
        }

        let iv = self.fx.next_iv();
        let sealed_header = seal_envelope(&self.fx.master, &iv, &header);
        self.body.extend_from_slice(&sealed_header);
        self.body
            .extend_from_slice(&(sealed_header.len() as u32).to_le_bytes());

        let pack_id = Id::digest(&self.body);
        self.fx
            .store
            .insert(format!("data/{}/{pack_id}", pack_id.hex_prefix()), self.body);

        IndexPack {
            id: pack_id,
            blobs: self
                .entries
                .iter()
                .map(|(id, blob_type, offset, length, uncompressed)| IndexBlob {
                    id: *id,
                    blob_type: *blob_type,
                    offset: *offset,
                    length: *length,
                    uncompressed_length: *uncompressed,
                })
                .collect(),
        }
    }
}

// ── Node & snapshot helpers ────────────────────────────────────────────

pub fn base_node(name: &str, node_type: NodeType) -> Node {
    Node {
        name: name.into(),
        node_type,
        mode: Some(0o644),
        mtime: None,
        atime: None,
        ctime: None,
        uid: Some(1000),
        gid: Some(1000),
        user: Some("alice".into()),
        group: Some("alice".into()),
        inode: None,
        device_id: None,
        links: None,
        size: None,
        content: None,
        subtree: None,
        linktarget: None,
    }
}

pub fn file_node(name: &str, size: u64, content: Vec<Id>) -> Node {
    let mut node = base_node(name, NodeType::File);
    node.size = Some(size);
    node.content = Some(content);
    node
}

pub fn dir_node(name: &str, subtree: Id) -> Node {
    let mut node = base_node(name, NodeType::Dir);
    node.mode = Some(0o755);
    node.subtree = Some(subtree);
    node
}

pub fn snapshot_at(time: OffsetDateTime, tree: Id) -> Snapshot {
    Snapshot {
        time,
        parent: None,
        tree,
        paths: vec!["/home".into()],
        hostname: Some("backup-host".into()),
        username: Some("alice".into()),
        tags: None,
        excludes: None,
        summary: None,
    }
}

// ── Instrumented stores ────────────────────────────────────────────────

/// Wraps a store and counts calls per operation and key.
pub struct CountingStore {
    inner: MemoryStore,
    counts: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        CountingStore {
            inner,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn bump(&self, op: &str, key: &str) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(format!("{op} {key}"))
            .or_insert(0) += 1;
    }

    /// Calls of `op` ("list"/"get"/"get_range"/"head") against `key`.
    pub fn calls(&self, op: &str, key: &str) -> usize {
        self.counts
            .lock()
            .unwrap()
            .get(&format!("{op} {key}"))
            .copied()
            .unwrap_or(0)
    }

    /// Total `get_range` calls across all keys.
    pub fn range_calls(&self) -> usize {
        self.counts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with("get_range "))
            .map(|(_, v)| v)
            .sum()
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn list(&self, prefix: &str) -> VaultResult<Vec<String>> {
        self.bump("list", prefix);
        self.inner.list(prefix).await
    }

    async fn get(&self, key: &str) -> VaultResult<Bytes> {
        self.bump("get", key);
        self.inner.get(key).await
    }

    async fn get_range(&self, key: &str, offset: u64, length: u64) -> VaultResult<Bytes> {
        self.bump("get_range", key);
        self.inner.get_range(key, offset, length).await
    }

    async fn head(&self, key: &str) -> VaultResult<ObjectMeta> {
        self.bump("head", key);
        self.inner.head(key).await
    }
}

/// Delays every ranged read, widening the window in which concurrent
/// requests for one blob overlap. Counts ranged reads too.
pub struct SlowRangeStore {
    inner: MemoryStore,
    delay: Duration,
    range_calls: AtomicU64,
}

impl SlowRangeStore {
    pub fn new(inner: MemoryStore, delay: Duration) -> Self {
        SlowRangeStore {
            inner,
            delay,
            range_calls: AtomicU64::new(0),
        }
    }

    pub fn range_calls(&self) -> u64 {
        self.range_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for SlowRangeStore {
    async fn list(&self, prefix: &str) -> VaultResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn get(&self, key: &str) -> VaultResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_range(&self, key: &str, offset: u64, length: u64) -> VaultResult<Bytes> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.get_range(key, offset, length).await
    }

    async fn head(&self, key: &str) -> VaultResult<ObjectMeta> {
        self.inner.head(key).await
    }
}
