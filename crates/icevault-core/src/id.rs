//! Content identifiers: 32-byte SHA-256 digests, rendered as 64 lowercase
//! hex characters in object keys and JSON.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::VaultError;

/// A 32-byte content identifier.
///
/// Every object in a repository is addressed by the SHA-256 of its
/// plaintext (before compression and encryption).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; 32]);

impl Id {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Id(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute the identifier of a plaintext.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Id(hasher.finalize().into())
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, VaultError> {
        if s.len() != 64 {
            return Err(VaultError::Format(format!(
                "identifier must be 64 hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| VaultError::Format(format!("bad identifier {s:?}: {e}")))?;
        Ok(Id(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First two hex characters, used as the shard directory for packs
    /// (`data/<XX>/<id-hex>`).
    pub fn hex_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.to_hex())
    }
}

impl std::str::FromStr for Id {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::from_hex(s)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = std::borrow::Cow::<str>::deserialize(deserializer)?;
        Id::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
