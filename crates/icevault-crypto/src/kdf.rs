//! Key derivation: scrypt passphrase → (encryption key, MAC key halves)
//!
//! scrypt output is 64 bytes, split into the 32-byte AES-256 key and the
//! two 16-byte Poly1305-AES halves. The same split applies to the
//! master-key record stored inside a key file.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use icevault_core::{VaultError, VaultResult};

use crate::{KEY_SIZE, MAC_KEY_HALF};

/// The repository key triple: data-encryption key plus the Poly1305-AES
/// `K` and `R` halves.
///
/// Also used for the password-derived key that unlocks a key file, which
/// has the same shape. Zeroized on drop.
pub struct MasterKey {
    encrypt: [u8; KEY_SIZE],
    mac_k: [u8; MAC_KEY_HALF],
    mac_r: [u8; MAC_KEY_HALF],
}

impl MasterKey {
    pub fn from_parts(
        encrypt: [u8; KEY_SIZE],
        mac_k: [u8; MAC_KEY_HALF],
        mac_r: [u8; MAC_KEY_HALF],
    ) -> Self {
        MasterKey {
            encrypt,
            mac_k,
            mac_r,
        }
    }

    /// Split 64 bytes of key material into (encrypt 32 | K 16 | R 16).
    pub fn from_okm(okm: &[u8; 64]) -> Self {
        let mut encrypt = [0u8; KEY_SIZE];
        let mut mac_k = [0u8; MAC_KEY_HALF];
        let mut mac_r = [0u8; MAC_KEY_HALF];
        encrypt.copy_from_slice(&okm[..32]);
        mac_k.copy_from_slice(&okm[32..48]);
        mac_r.copy_from_slice(&okm[48..]);
        MasterKey {
            encrypt,
            mac_k,
            mac_r,
        }
    }

    pub fn encrypt_key(&self) -> &[u8; KEY_SIZE] {
        &self.encrypt
    }

    pub fn mac_k(&self) -> &[u8; MAC_KEY_HALF] {
        &self.mac_k
    }

    pub fn mac_r(&self) -> &[u8; MAC_KEY_HALF] {
        &self.mac_r
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.encrypt.zeroize();
        self.mac_k.zeroize();
        self.mac_r.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("encrypt", &"[REDACTED]")
            .field("mac", &"[REDACTED]")
            .finish()
    }
}

/// scrypt cost parameters as recorded in a key file.
#[derive(Debug, Clone, Copy)]
pub struct ScryptParams {
    /// CPU/memory cost; must be a power of two greater than one.
    pub n: u64,
    pub r: u32,
    pub p: u32,
}

impl ScryptParams {
    fn log_n(&self) -> VaultResult<u8> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(VaultError::Format(format!(
                "scrypt N must be a power of two > 1, got {}",
                self.n
            )));
        }
        Ok(self.n.trailing_zeros() as u8)
    }
}

/// Derive the password key that guards a key file.
pub fn derive_user_key(
    password: &SecretString,
    salt: &[u8],
    params: &ScryptParams,
) -> VaultResult<MasterKey> {
    let scrypt_params = scrypt::Params::new(params.log_n()?, params.r, params.p, 64)
        .map_err(|e| VaultError::Format(format!("invalid scrypt parameters: {e}")))?;

    let mut okm = [0u8; 64];
    scrypt::scrypt(
        password.expose_secret().as_bytes(),
        salt,
        &scrypt_params,
        &mut okm,
    )
    .map_err(|e| VaultError::Format(format!("scrypt derivation failed: {e}")))?;

    let key = MasterKey::from_okm(&okm);
    okm.zeroize();
    Ok(key)
}
