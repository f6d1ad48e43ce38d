//! AES-256-GCM helper for shareable-link payloads.
//!
//! Not part of the repository format; link encoders layered on top of the
//! client use it to protect credentials embedded in a link. Framing:
//! `nonce[12] || ciphertext || tag[16]` (the tag is appended by GCM).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use icevault_core::{ObjectKind, VaultError, VaultResult};

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` with a fresh random nonce.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| VaultError::Format("gcm encryption failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt and verify a `seal` output.
pub fn open(key: &[u8; 32], data: &[u8]) -> VaultResult<Vec<u8>> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::Authentication(ObjectKind::Link));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Authentication(ObjectKind::Link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [0x21u8; 32];
        let sealed = seal(&key, b"s3://bucket?credentials").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 23 + TAG_SIZE);
        let plain = open(&key, &sealed).unwrap();
        assert_eq!(plain, b"s3://bucket?credentials");
    }

    #[test]
    fn nonces_are_fresh() {
        let key = [0x21u8; 32];
        let a = seal(&key, b"same input").unwrap();
        let b = seal(&key, b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tamper_is_rejected() {
        let key = [0x21u8; 32];
        let mut sealed = seal(&key, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert!(matches!(
            open(&key, &sealed),
            Err(VaultError::Authentication(ObjectKind::Link))
        ));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let sealed = seal(&[0x21u8; 32], b"payload").unwrap();
        assert!(open(&[0x22u8; 32], &sealed).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(open(&[0u8; 32], &[0u8; 10]).is_err());
    }
}
