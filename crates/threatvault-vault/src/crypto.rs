//! Document sealing: Argon2id key derivation, gzip and AES-256-GCM.
//!
//! A stored document is `nonce(12) || AES-256-GCM(gzip(plaintext))` with no
//! associated data. The symmetric key is re-derived from the capability key
//! on every request and zeroed when dropped.

use std::fmt;
use std::io::{Read, Write};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use threatvault_core::{random_bytes, CapabilityKey, KEY_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
        }
    }
}

/// A derived AES-256 key. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Derive the document key from a capability key.
///
/// Secret is `key[16..]`, salt is `key[..16]`. Deterministic for fixed
/// parameters. Deliberately slow; call it off the async executor.
pub fn derive_symmetric_key(key: &CapabilityKey, params: &KdfParams) -> Result<SymmetricKey> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| VaultError::Kdf(e.to_string()))?;

    let mut out = [0u8; KEY_SIZE];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(key.secret(), key.salt(), &mut out)
        .map_err(|e| VaultError::Kdf(e.to_string()))?;

    let derived = SymmetricKey(out);
    out.zeroize();
    Ok(derived)
}

fn cipher_for(key: &SymmetricKey) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| VaultError::Kdf(e.to_string()))
}

/// Encrypt `plaintext` under a fresh random nonce. Returns `nonce || ciphertext`.
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce_bytes: [u8; NONCE_LEN] = random_bytes();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| VaultError::Integrity)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt and authenticate `nonce || ciphertext`.
///
/// Any failure, including a truncated input, is [`VaultError::Integrity`];
/// no plaintext is produced unless the tag verifies.
pub fn open(key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(VaultError::Integrity);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    cipher_for(key)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::Integrity)
}

/// Gzip `data`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Gunzip `data`, refusing to produce more than `limit` bytes.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)?;

    if out.len() > limit {
        return Err(VaultError::DocumentTooLarge {
            size: out.len(),
            limit,
        });
    }
    Ok(out)
}

/// Compress then seal a document.
pub fn seal_document(key: &SymmetricKey, text: &str) -> Result<Vec<u8>> {
    seal(key, &compress(text.as_bytes())?)
}

/// Open then decompress a document.
pub fn open_document(key: &SymmetricKey, sealed: &[u8], limit: usize) -> Result<String> {
    let compressed = open(key, sealed)?;
    let bytes = decompress(&compressed, limit)?;
    String::from_utf8(bytes).map_err(|_| VaultError::Integrity)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests stay fast.
    const FAST: KdfParams = KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    fn test_key() -> SymmetricKey {
        derive_symmetric_key(&CapabilityKey::from_bytes([7; 32]), &FAST).unwrap()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let key = CapabilityKey::from_bytes([42; 32]);
        let a = derive_symmetric_key(&key, &KdfParams::default()).unwrap();
        let b = derive_symmetric_key(&key, &KdfParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derivation_depends_on_key_and_params() {
        let a = derive_symmetric_key(&CapabilityKey::from_bytes([1; 32]), &FAST).unwrap();
        let b = derive_symmetric_key(&CapabilityKey::from_bytes([2; 32]), &FAST).unwrap();
        let c = derive_symmetric_key(
            &CapabilityKey::from_bytes([1; 32]),
            &KdfParams { iterations: 2, ..FAST },
        )
        .unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        };
        assert!(matches!(
            derive_symmetric_key(&CapabilityKey::from_bytes([1; 32]), &params),
            Err(VaultError::Kdf(_))
        ));
    }

    #[test]
    fn test_seal_layout_and_fresh_nonce() {
        let key = test_key();
        let a = seal(&key, b"title: A").unwrap();
        let b = seal(&key, b"title: A").unwrap();

        // nonce + plaintext + 16-byte tag
        assert_eq!(a.len(), NONCE_LEN + 8 + 16);
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_eq!(open(&key, &a).unwrap(), b"title: A");
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let key = test_key();
        let sealed = seal_document(&key, "title: tamper me").unwrap();

        for i in 0..sealed.len() {
            for bit in 0..8 {
                let mut corrupted = sealed.clone();
                corrupted[i] ^= 1 << bit;
                assert!(matches!(
                    open_document(&key, &corrupted, 1024),
                    Err(VaultError::Integrity)
                ));
            }
        }
    }

    #[test]
    fn test_wrong_key_and_truncation() {
        let sealed = seal(&test_key(), b"secret").unwrap();
        let other = derive_symmetric_key(&CapabilityKey::from_bytes([8; 32]), &FAST).unwrap();

        assert!(matches!(open(&other, &sealed), Err(VaultError::Integrity)));
        assert!(matches!(open(&test_key(), &sealed[..5]), Err(VaultError::Integrity)));
        assert!(matches!(open(&test_key(), &[]), Err(VaultError::Integrity)));
    }

    #[test]
    fn test_decompress_is_bounded() {
        let bomb = compress(&vec![b'a'; 10_000]).unwrap();
        assert!(bomb.len() < 1_000);

        assert_eq!(decompress(&bomb, 10_000).unwrap().len(), 10_000);
        assert!(matches!(
            decompress(&bomb, 9_999),
            Err(VaultError::DocumentTooLarge { limit: 9_999, .. })
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", test_key()), "SymmetricKey(..)");
    }

    proptest::proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn test_document_round_trip(text in "\\PC{0,512}") {
            let key = test_key();
            let sealed = seal_document(&key, &text).unwrap();
            proptest::prop_assert_eq!(open_document(&key, &sealed, 1 << 20).unwrap(), text);
        }
    }
}
