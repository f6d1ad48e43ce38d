//! The repository facade: lifecycle and the caller-facing API.
//!
//! `open` performs the unlock sequence (config GET → key unlock → config
//! decrypt → version check) and wires the engine together. The blob index
//! is built lazily on the first operation that needs it, exactly once,
//! with concurrent first callers waiting on the same build.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use icevault_core::{Id, Node, ObjectKind, RepoConfig, Snapshot, Tree, VaultError, VaultResult};
use icevault_crypto::open_envelope;
use icevault_store::ObjectStore;

use crate::index::BlobIndex;
use crate::pack::PackReader;
use crate::read::{self, FileStream};
use crate::tree::{self, Browse};
use crate::{codec, keys, layout, snapshot};

#[derive(Debug, Clone, Default)]
pub struct RepositoryBuilder {
    verify_blobs: bool,
}

impl RepositoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-hash every blob after decryption and compare against its
    /// identifier. Off by default; turns silent corruption into
    /// `Integrity` errors at the cost of one SHA-256 per blob.
    pub fn verify_blobs(mut self, on: bool) -> Self {
        self.verify_blobs = on;
        self
    }

    /// Unlock a repository and wire up the engine.
    pub async fn open(
        self,
        store: Arc<dyn ObjectStore>,
        password: &SecretString,
    ) -> VaultResult<Repository> {
        // A missing config object means "not a repository"; check before
        // paying for the KDF.
        let config_body = store.get(layout::CONFIG).await?;

        let master = Arc::new(keys::unlock(store.as_ref(), password).await?);

        let plain = open_envelope(&master, ObjectKind::Config, &config_body)?;
        // The version is unknown until the config is decoded, so its
        // encoding is sniffed rather than version-selected.
        let decoded = codec::decode_unpacked(2, plain)?;
        let config: RepoConfig = serde_json::from_slice(&decoded)
            .map_err(|e| VaultError::Format(format!("config: {e}")))?;
        config.validate()?;

        info!(repository = %config.id, version = config.version, "repository opened");

        let packs = Arc::new(PackReader::new(
            Arc::clone(&store),
            Arc::clone(&master),
            self.verify_blobs,
        ));
        Ok(Repository {
            inner: Arc::new(Inner {
                store,
                master,
                config,
                packs,
                index: OnceCell::new(),
            }),
        })
    }
}

/// An unlocked repository. Cheap to clone; all clones share the engine.
#[derive(Clone)]
pub struct Repository {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

struct Inner {
    store: Arc<dyn ObjectStore>,
    master: Arc<icevault_crypto::MasterKey>,
    config: RepoConfig,
    packs: Arc<PackReader>,
    index: OnceCell<Arc<BlobIndex>>,
}

impl Repository {
    /// Open with default settings; see [`RepositoryBuilder`] for knobs.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        password: &SecretString,
    ) -> VaultResult<Repository> {
        RepositoryBuilder::new().open(store, password).await
    }

    pub fn builder() -> RepositoryBuilder {
        RepositoryBuilder::new()
    }

    pub fn config(&self) -> &RepoConfig {
        &self.inner.config
    }

    /// The repository UUID from its config.
    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    /// All readable snapshots, newest first.
    pub async fn list_snapshots(&self) -> VaultResult<Vec<(Id, Snapshot)>> {
        snapshot::list_snapshots(
            self.inner.store.as_ref(),
            &self.inner.master,
            &self.inner.config,
        )
        .await
    }

    /// The root directory listing of a snapshot.
    pub async fn load_snapshot_tree(&self, snapshot: &Snapshot) -> VaultResult<Tree> {
        let index = self.blob_index().await?;
        tree::load_tree(&index, &self.inner.packs, &snapshot.tree).await
    }

    /// Walk `path` from the snapshot root.
    pub async fn browse(&self, snapshot: &Snapshot, path: &str) -> VaultResult<Browse> {
        let index = self.blob_index().await?;
        tree::browse(&index, &self.inner.packs, snapshot, path).await
    }

    /// Stream a file node's content in recorded order.
    pub async fn read_file(&self, node: &Node) -> VaultResult<FileStream> {
        let index = self.blob_index().await?;
        read::stream_file(index, Arc::clone(&self.inner.packs), node)
    }

    /// Drop this handle. Key material is zeroized when the last clone
    /// (including in-flight streams) goes away.
    pub fn close(self) {}

    /// The lazily built blob index; concurrent first callers share one
    /// build, later callers get the cached map.
    async fn blob_index(&self) -> VaultResult<Arc<BlobIndex>> {
        let built = self
            .inner
            .index
            .get_or_try_init(|| async {
                debug!("building blob index");
                let index = BlobIndex::load(
                    self.inner.store.as_ref(),
                    &self.inner.master,
                    &self.inner.config,
                )
                .await?;
                Ok::<_, VaultError>(Arc::new(index))
            })
            .await?;
        Ok(Arc::clone(built))
    }
}
