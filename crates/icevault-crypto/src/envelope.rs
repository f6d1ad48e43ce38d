//! The authenticated envelope every encrypted object uses:
//! `IV[16] || ciphertext[N] || tag[16]`, N >= 0.
//!
//! Opening verifies the Poly1305-AES tag over the ciphertext (nonce = IV)
//! before AES-256-CTR decryption. A too-short body or a failed tag both
//! surface as an authentication error for the object kind being read.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher};

use icevault_core::{ObjectKind, VaultError, VaultResult};

use crate::kdf::MasterKey;
use crate::mac;

pub const IV_SIZE: usize = 16;
pub const TAG_SIZE: usize = mac::TAG_SIZE;

/// Fixed per-object encryption overhead: IV plus tag.
pub const OVERHEAD: usize = IV_SIZE + TAG_SIZE;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Verify and decrypt one envelope. `kind` names what is being read and
/// is carried into the error on failure.
pub fn open_envelope(key: &MasterKey, kind: ObjectKind, data: &[u8]) -> VaultResult<Vec<u8>> {
    if data.len() < OVERHEAD {
        return Err(VaultError::Authentication(kind));
    }

    let (iv, rest) = data.split_at(IV_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);
    let iv: [u8; IV_SIZE] = iv
        .try_into()
        .map_err(|_| VaultError::Format("envelope iv truncated".into()))?;

    if !mac::verify(key.mac_k(), key.mac_r(), &iv, ciphertext, tag) {
        return Err(VaultError::Authentication(kind));
    }

    let mut plaintext = ciphertext.to_vec();
    let mut cipher = Aes256Ctr::new(
        GenericArray::from_slice(key.encrypt_key()),
        GenericArray::from_slice(&iv),
    );
    cipher.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

/// Encrypt and authenticate `plaintext` under `key` with the given IV.
///
/// The read path never calls this; it exists so fixtures and tests can
/// produce byte-exact repository objects.
pub fn seal_envelope(key: &MasterKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let mut ciphertext = plaintext.to_vec();
    let mut cipher = Aes256Ctr::new(
        GenericArray::from_slice(key.encrypt_key()),
        GenericArray::from_slice(iv),
    );
    cipher.apply_keystream(&mut ciphertext);

    let tag = mac::tag(key.mac_k(), key.mac_r(), iv, &ciphertext);

    let mut out = Vec::with_capacity(OVERHEAD + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    out
}
