//! OpenDAL-backed S3 store.
//!
//! Path-style addressing (the OpenDAL default), which MinIO and SeaweedFS
//! require. Transport-level retries live here as an OpenDAL layer; the
//! engine above never retries.

use async_trait::async_trait;
use bytes::Bytes;
use opendal::Operator;

use icevault_core::{VaultError, VaultResult};

use crate::{ObjectMeta, ObjectStore, StoreConfig};

#[derive(Debug)]
pub struct S3Store {
    op: Operator,
}

impl S3Store {
    /// Build a store from config. Fails on plaintext HTTP endpoints when
    /// `enforce_tls` is set; otherwise HTTP only warns.
    pub fn open(cfg: &StoreConfig) -> VaultResult<Self> {
        if cfg.endpoint.starts_with("http://") {
            if cfg.enforce_tls {
                return Err(VaultError::Config(format!(
                    "S3 endpoint uses plaintext HTTP ({}) but enforce_tls is enabled",
                    cfg.endpoint
                )));
            }
            tracing::warn!(
                endpoint = %cfg.endpoint,
                "S3 endpoint uses plaintext HTTP; credentials travel unencrypted"
            );
        }

        let (access_key, secret_key) = cfg.credentials()?;

        let mut builder = opendal::services::S3::default()
            .endpoint(&cfg.endpoint)
            .region(&cfg.region)
            .bucket(&cfg.bucket)
            .access_key_id(&access_key)
            .secret_access_key(&secret_key);
        if !cfg.prefix.is_empty() {
            builder = builder.root(&format!("/{}", cfg.prefix.trim_matches('/')));
        }

        let op = Operator::new(builder)
            .map_err(|e| VaultError::Config(format!("building S3 operator: {e}")))?
            .layer(opendal::layers::LoggingLayer::default())
            .layer(
                opendal::layers::RetryLayer::new()
                    .with_max_times(5)
                    .with_jitter(),
            )
            .finish();

        Ok(S3Store { op })
    }

    /// Wrap an already-built operator (custom layers, other services).
    pub fn from_operator(op: Operator) -> Self {
        S3Store { op }
    }

    fn transport(key: &str, e: opendal::Error) -> VaultError {
        VaultError::transport(key, e)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str) -> VaultResult<Vec<String>> {
        // The OpenDAL lister drives continuation tokens internally until
        // the listing is exhausted.
        let entries = self
            .op
            .list_with(prefix)
            .recursive(true)
            .await
            .map_err(|e| Self::transport(prefix, e))?;

        Ok(entries
            .into_iter()
            .filter(|e| e.metadata().mode().is_file())
            .map(|e| e.path().to_string())
            .collect())
    }

    async fn get(&self, key: &str) -> VaultResult<Bytes> {
        let buf = self
            .op
            .read(key)
            .await
            .map_err(|e| Self::transport(key, e))?;
        Ok(buf.to_bytes())
    }

    async fn get_range(&self, key: &str, offset: u64, length: u64) -> VaultResult<Bytes> {
        let buf = self
            .op
            .read_with(key)
            .range(offset..offset + length)
            .await
            .map_err(|e| Self::transport(key, e))?;

        let mut bytes = buf.to_bytes();
        // A backend that ignored the range and answered 200 gets cut
        // down to the requested window; a short body is an error.
        if (bytes.len() as u64) > length {
            bytes = bytes.slice(..length as usize);
        }
        if (bytes.len() as u64) < length {
            return Err(VaultError::transport(
                key,
                format!(
                    "short range read: wanted {length} bytes at {offset}, got {}",
                    bytes.len()
                ),
            ));
        }
        Ok(bytes)
    }

    async fn head(&self, key: &str) -> VaultResult<ObjectMeta> {
        let meta = self
            .op
            .stat(key)
            .await
            .map_err(|e| Self::transport(key, e))?;
        Ok(ObjectMeta {
            size: meta.content_length(),
        })
    }
}
