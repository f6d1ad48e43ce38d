//! Format-version-aware decoding of decrypted plaintexts.
//!
//! Unpacked files (config, indexes, snapshots) signal compression with a
//! leading byte in version-2 repositories; version-1 files are always raw
//! JSON. Packed blobs carry no marker: their index entry says whether the
//! payload is compressed, and to what size it must expand.

use icevault_core::{VaultError, VaultResult};

/// Leading byte marking a zstd-compressed unpacked file.
const COMPRESSED: u8 = 0x02;

/// Decode an unpacked file's plaintext for the given format version.
///
/// Version 2 accepts raw JSON too: files written before an upgrade from
/// version 1 keep their original encoding.
pub fn decode_unpacked(version: u32, plain: Vec<u8>) -> VaultResult<Vec<u8>> {
    if version < 2 {
        return Ok(plain);
    }
    match plain.first() {
        Some(b'{') | Some(b'[') => Ok(plain),
        Some(&COMPRESSED) => zstd::decode_all(&plain[1..])
            .map_err(|e| VaultError::Decompression(e.to_string())),
        Some(b) => Err(VaultError::Format(format!(
            "unsupported encoding byte 0x{b:02x}"
        ))),
        None => Err(VaultError::Format("empty unpacked file".into())),
    }
}

/// Decode a packed blob's plaintext. `uncompressed_length` comes from the
/// blob's index entry; when present and non-zero the payload must expand
/// to exactly that many bytes.
pub fn decode_blob(plain: Vec<u8>, uncompressed_length: Option<u64>) -> VaultResult<Vec<u8>> {
    let expected = match uncompressed_length {
        None | Some(0) => return Ok(plain),
        Some(n) => n,
    };
    let out =
        zstd::decode_all(&plain[..]).map_err(|e| VaultError::Decompression(e.to_string()))?;
    if out.len() as u64 != expected {
        return Err(VaultError::Decompression(format!(
            "blob expanded to {} bytes, index records {expected}",
            out.len()
        )));
    }
    Ok(out)
}
