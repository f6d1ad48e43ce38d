//! Snapshot enumeration.
//!
//! Lists `snapshots/`, decodes each record, and yields them newest first
//! (ties broken by identifier). A snapshot that fails to decode is logged
//! and skipped; one corrupt record must not hide the rest.

use futures::stream::{self, StreamExt};
use tracing::warn;

use icevault_core::{Id, ObjectKind, RepoConfig, Snapshot, VaultError, VaultResult};
use icevault_crypto::{open_envelope, MasterKey};
use icevault_store::ObjectStore;

use crate::{codec, layout, FETCH_FANOUT};

/// All readable snapshots, sorted by timestamp descending.
pub async fn list_snapshots(
    store: &dyn ObjectStore,
    master: &MasterKey,
    config: &RepoConfig,
) -> VaultResult<Vec<(Id, Snapshot)>> {
    let keys = store.list(layout::SNAPSHOTS_PREFIX).await?;

    let mut snapshots: Vec<(Id, Snapshot)> = Vec::with_capacity(keys.len());
    let mut fetches = stream::iter(keys.iter().map(|key| async move {
        (key.as_str(), load_snapshot(store, master, config, key).await)
    }))
    .buffer_unordered(FETCH_FANOUT);

    while let Some((key, result)) = fetches.next().await {
        match result {
            Ok(entry) => snapshots.push(entry),
            Err(e) => warn!(key = %key, error = %e, "skipping unreadable snapshot"),
        }
    }

    snapshots.sort_by(|(id_a, a), (id_b, b)| b.time.cmp(&a.time).then_with(|| id_a.cmp(id_b)));
    Ok(snapshots)
}

async fn load_snapshot(
    store: &dyn ObjectStore,
    master: &MasterKey,
    config: &RepoConfig,
    key: &str,
) -> VaultResult<(Id, Snapshot)> {
    // The snapshot's ID is its object-key basename, not a record field.
    let id = layout::id_from_key(key)
        .ok_or_else(|| VaultError::Format(format!("snapshot key {key:?} has no identifier")))?;
    let body = store.get(key).await?;
    let plain = open_envelope(master, ObjectKind::Snapshot, &body)?;
    let decoded = codec::decode_unpacked(config.version, plain)?;
    let snapshot: Snapshot = serde_json::from_slice(&decoded)
        .map_err(|e| VaultError::Format(format!("snapshot {id}: {e}")))?;
    Ok((id, snapshot))
}
