//! icevault-crypto: the primitives behind the repository's encryption.
//!
//! Every encrypted object in a repository uses one envelope format:
//!
//! ```text
//! [16 bytes: IV][N bytes: AES-256-CTR ciphertext][16 bytes: Poly1305-AES tag]
//! ```
//!
//! The tag covers the ciphertext (not the IV) and reuses the IV as the MAC
//! nonce. Keys come either from the password via scrypt (unlocking a key
//! file) or from the master-key record inside one.
//!
//! The AES-256-GCM helper is unrelated to the repository format; it exists
//! for link-sharing layers built on top of this crate.

pub mod envelope;
pub mod gcm;
pub mod kdf;
pub mod mac;

pub use envelope::{open_envelope, seal_envelope, IV_SIZE, OVERHEAD, TAG_SIZE};
pub use kdf::{derive_user_key, MasterKey, ScryptParams};

/// Size of the AES-256 data-encryption key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of each Poly1305-AES key half (`K` and `R`) in bytes.
pub const MAC_KEY_HALF: usize = 16;
