//! Key discovery and password unlock.
//!
//! Every object under `keys/` is a plaintext JSON record whose `data`
//! field is an envelope sealed with the password-derived key. Trying a
//! password means deriving its scrypt key against the file's salt and
//! opening that envelope; the first file that authenticates yields the
//! repository master key. Trial order is whatever the store listing
//! returns.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::SecretString;
use tracing::debug;
use zeroize::Zeroize;

use icevault_core::{KeyFile, MasterKeyFile, ObjectKind, VaultError, VaultResult};
use icevault_crypto::{derive_user_key, open_envelope, MasterKey, ScryptParams};
use icevault_store::ObjectStore;

use crate::layout;

/// Unlock the repository, returning its master key.
///
/// Fails with `NoKeys` when `keys/` is empty and with `BadPassword` when
/// no key file authenticates; the latter carries only the most recent
/// per-file failure.
pub async fn unlock(store: &dyn ObjectStore, password: &SecretString) -> VaultResult<MasterKey> {
    let key_files = store.list(layout::KEYS_PREFIX).await?;
    if key_files.is_empty() {
        return Err(VaultError::NoKeys);
    }

    let mut last_err = None;
    for key_path in &key_files {
        match try_key_file(store, password, key_path).await {
            Ok(master) => {
                debug!(key = %key_path, "key file accepted");
                return Ok(master);
            }
            Err(e) => {
                debug!(key = %key_path, error = %e, "key file rejected");
                last_err = Some(e);
            }
        }
    }
    Err(VaultError::BadPassword(Box::new(
        last_err.unwrap_or(VaultError::NoKeys),
    )))
}

async fn try_key_file(
    store: &dyn ObjectStore,
    password: &SecretString,
    key_path: &str,
) -> VaultResult<MasterKey> {
    let body = store.get(key_path).await?;
    let key_file: KeyFile = serde_json::from_slice(&body)
        .map_err(|e| VaultError::Format(format!("key file {key_path}: {e}")))?;

    if key_file.kdf != "scrypt" {
        return Err(VaultError::Format(format!(
            "unsupported kdf {:?} in {key_path}",
            key_file.kdf
        )));
    }

    let salt = BASE64
        .decode(&key_file.salt)
        .map_err(|e| VaultError::Format(format!("key file salt: {e}")))?;
    let params = ScryptParams {
        n: key_file.n,
        r: key_file.r,
        p: key_file.p,
    };
    let user_key = derive_user_key(password, &salt, &params)?;

    let sealed = BASE64
        .decode(&key_file.data)
        .map_err(|e| VaultError::Format(format!("key file data: {e}")))?;
    let mut plain = open_envelope(&user_key, ObjectKind::Key, &sealed)?;

    let record: VaultResult<MasterKeyFile> = serde_json::from_slice(&plain)
        .map_err(|e| VaultError::Format(format!("master key record: {e}")));
    plain.zeroize();

    master_key_from_record(&record?)
}

fn master_key_from_record(record: &MasterKeyFile) -> VaultResult<MasterKey> {
    let encrypt = decode_fixed::<32>(&record.encrypt, "encrypt")?;
    let mac_k = decode_fixed::<16>(&record.mac.k, "mac.k")?;
    let mac_r = decode_fixed::<16>(&record.mac.r, "mac.r")?;
    Ok(MasterKey::from_parts(encrypt, mac_k, mac_r))
}

fn decode_fixed<const N: usize>(b64: &str, field: &str) -> VaultResult<[u8; N]> {
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| VaultError::Format(format!("master key {field}: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        VaultError::Format(format!("master key {field} must be {N} bytes, got {}", v.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use icevault_crypto::seal_envelope;
    use icevault_store::MemoryStore;
    use serde_json::json;

    // Small N keeps the scrypt work negligible in tests.
    const TEST_N: u64 = 1024;

    fn seeded_store(password: &str) -> (MemoryStore, MasterKey) {
        let store = MemoryStore::new();
        let master = MasterKey::from_okm(&[0x5c; 64]);
        let key_id = icevault_core::Id::digest(b"test key file");
        store.insert(
            format!("keys/{key_id}"),
            key_file_body(password, &master, &[0xAA; 32]),
        );
        (store, master)
    }

    fn key_file_body(password: &str, master: &MasterKey, salt: &[u8; 32]) -> Vec<u8> {
        let params = ScryptParams { n: TEST_N, r: 8, p: 1 };
        let user_key =
            derive_user_key(&SecretString::from(password), salt, &params).unwrap();

        let record = json!({
            "mac": {
                "k": BASE64.encode(master.mac_k()),
                "r": BASE64.encode(master.mac_r()),
            },
            "encrypt": BASE64.encode(master.encrypt_key()),
        });
        let sealed = seal_envelope(&user_key, &[0x01; 16], record.to_string().as_bytes());

        serde_json::to_vec(&json!({
            "created": "2024-01-02T03:04:05Z",
            "username": "alice",
            "hostname": "backup-host",
            "kdf": "scrypt",
            "N": TEST_N,
            "r": 8,
            "p": 1,
            "salt": BASE64.encode(salt),
            "data": BASE64.encode(sealed),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn unlock_with_correct_password() {
        let (store, master) = seeded_store("open sesame");
        let unlocked = unlock(&store, &SecretString::from("open sesame"))
            .await
            .unwrap();
        assert_eq!(unlocked.encrypt_key(), master.encrypt_key());
        assert_eq!(unlocked.mac_k(), master.mac_k());
        assert_eq!(unlocked.mac_r(), master.mac_r());
    }

    #[tokio::test]
    async fn wrong_password_is_bad_password() {
        let (store, _) = seeded_store("open sesame");
        let err = unlock(&store, &SecretString::from("open says me"))
            .await
            .unwrap_err();
        match err {
            VaultError::BadPassword(inner) => {
                assert!(matches!(*inner, VaultError::Authentication(ObjectKind::Key)));
            }
            other => panic!("expected BadPassword, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_keys_dir_is_no_keys() {
        let store = MemoryStore::new();
        let err = unlock(&store, &SecretString::from("any")).await.unwrap_err();
        assert!(matches!(err, VaultError::NoKeys));
    }

    #[tokio::test]
    async fn second_key_file_can_win() {
        let (store, master) = seeded_store("open sesame");
        // A malformed key file that sorts first must not abort the trial.
        store.insert("keys/0000", b"not json".to_vec());
        let unlocked = unlock(&store, &SecretString::from("open sesame"))
            .await
            .unwrap();
        assert_eq!(unlocked.encrypt_key(), master.encrypt_key());
    }

    #[tokio::test]
    async fn non_scrypt_kdf_is_rejected() {
        let store = MemoryStore::new();
        store.insert(
            "keys/0000",
            serde_json::to_vec(&json!({
                "kdf": "argon2id",
                "N": 1024, "r": 8, "p": 1,
                "salt": "AAAA", "data": "AAAA",
            }))
            .unwrap(),
        );
        let err = unlock(&store, &SecretString::from("pw")).await.unwrap_err();
        match err {
            VaultError::BadPassword(inner) => {
                assert!(inner.to_string().contains("argon2id"));
            }
            other => panic!("expected BadPassword, got {other:?}"),
        }
    }
}
