//! Poly1305-AES message authentication.
//!
//! The MAC key is two 16-byte halves: `K` feeds AES-128 to turn the nonce
//! into the Poly1305 pad `s`, and `R` (clamped) is the polynomial
//! evaluation point:
//!
//! ```text
//! s   = AES-128(K, nonce)
//! tag = Poly1305(message, clamp(R)) + s  mod 2^128
//! ```
//!
//! Verification is constant-time; there is no early exit on mismatching
//! bytes.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use poly1305::Poly1305;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::MAC_KEY_HALF;

/// Size of a Poly1305 tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Zero the top 4 bits of r[3], r[7], r[11], r[15] and the bottom 2 bits
/// of r[4], r[8], r[12], per the Poly1305 key schedule.
fn clamp(r: &[u8; MAC_KEY_HALF]) -> [u8; MAC_KEY_HALF] {
    let mut r = *r;
    r[3] &= 0x0f;
    r[7] &= 0x0f;
    r[11] &= 0x0f;
    r[15] &= 0x0f;
    r[4] &= 0xfc;
    r[8] &= 0xfc;
    r[12] &= 0xfc;
    r
}

/// Compute the Poly1305-AES tag of `message` under (`mac_k`, `mac_r`)
/// with the given 16-byte nonce.
pub fn tag(
    mac_k: &[u8; MAC_KEY_HALF],
    mac_r: &[u8; MAC_KEY_HALF],
    nonce: &[u8; 16],
    message: &[u8],
) -> [u8; TAG_SIZE] {
    let cipher = Aes128::new(GenericArray::from_slice(mac_k));
    let mut pad = GenericArray::clone_from_slice(nonce);
    cipher.encrypt_block(&mut pad);

    // Poly1305 key layout: r (clamped) || s.
    let mut key = [0u8; 32];
    key[..MAC_KEY_HALF].copy_from_slice(&clamp(mac_r));
    key[MAC_KEY_HALF..].copy_from_slice(&pad);

    let out: [u8; TAG_SIZE] = Poly1305::new(GenericArray::from_slice(&key))
        .compute_unpadded(message)
        .into();
    key.zeroize();
    out
}

/// Constant-time tag verification. `expected` of any length other than 16
/// never verifies.
pub fn verify(
    mac_k: &[u8; MAC_KEY_HALF],
    mac_r: &[u8; MAC_KEY_HALF],
    nonce: &[u8; 16],
    message: &[u8],
    expected: &[u8],
) -> bool {
    if expected.len() != TAG_SIZE {
        return false;
    }
    let computed = tag(mac_k, mac_r, nonce, message);
    computed.ct_eq(expected).into()
}
