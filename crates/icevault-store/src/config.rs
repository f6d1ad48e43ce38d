//! Client-side store configuration (loaded from a TOML file or built in
//! code). Credentials may live in the file or fall back to the standard
//! AWS environment variables.

use serde::{Deserialize, Serialize};

use icevault_core::{VaultError, VaultResult};

/// Everything needed to reach one repository bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// S3-compatible endpoint URL.
    pub endpoint: String,
    /// Region (default: us-east-1).
    pub region: String,
    /// Bucket name.
    pub bucket: String,
    /// Key prefix under which the repository lives ("" = bucket root).
    pub prefix: String,
    /// Access key; `AWS_ACCESS_KEY_ID` is used when unset.
    pub access_key_id: Option<String>,
    /// Secret key; `AWS_SECRET_ACCESS_KEY` is used when unset.
    pub secret_access_key: Option<String>,
    /// Refuse plaintext HTTP endpoints.
    pub enforce_tls: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "backups".into(),
            prefix: String::new(),
            access_key_id: None,
            secret_access_key: None,
            enforce_tls: false,
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> VaultResult<Self> {
        toml::from_str(text).map_err(|e| VaultError::Config(format!("bad store config: {e}")))
    }

    /// Resolve credentials from the config, falling back to the AWS
    /// environment variables.
    pub fn credentials(&self) -> VaultResult<(String, String)> {
        let access = match &self.access_key_id {
            Some(k) => k.clone(),
            None => std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
                VaultError::Config(
                    "S3 credentials not set: configure access_key_id or export AWS_ACCESS_KEY_ID"
                        .into(),
                )
            })?,
        };
        let secret = match &self.secret_access_key {
            Some(k) => k.clone(),
            None => std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
                VaultError::Config("AWS_SECRET_ACCESS_KEY not set".into())
            })?,
        };
        Ok((access, secret))
    }
}
