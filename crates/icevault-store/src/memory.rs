//! In-memory object store for tests and embedded fixtures.
//!
//! Deterministic listing order (sorted by key), exact range semantics.
//! Cloning shares the underlying map.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use icevault_core::{VaultError, VaultResult};

use crate::{ObjectMeta, ObjectStore};

#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(key.into(), data.into());
    }

    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn missing(key: &str) -> VaultError {
        VaultError::transport(key, "object not found")
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> VaultResult<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get(&self, key: &str) -> VaultResult<Bytes> {
        let objects = self.objects.lock().unwrap();
        objects.get(key).cloned().ok_or_else(|| Self::missing(key))
    }

    async fn get_range(&self, key: &str, offset: u64, length: u64) -> VaultResult<Bytes> {
        let objects = self.objects.lock().unwrap();
        let data = objects.get(key).ok_or_else(|| Self::missing(key))?;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| VaultError::transport(key, "range overflow"))?;
        if end > data.len() as u64 {
            return Err(VaultError::transport(
                key,
                format!(
                    "range {offset}+{length} beyond object of {} bytes",
                    data.len()
                ),
            ));
        }
        Ok(data.slice(offset as usize..end as usize))
    }

    async fn head(&self, key: &str) -> VaultResult<ObjectMeta> {
        let objects = self.objects.lock().unwrap();
        let data = objects.get(key).ok_or_else(|| Self::missing(key))?;
        Ok(ObjectMeta {
            size: data.len() as u64,
        })
    }
}
