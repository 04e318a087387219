//! Hashing, XOR and randomness helpers.
//!
//! Every credential in the system is [`KEY_SIZE`] bytes. Digests use SHA-2:
//! SHA-512 names a tenant's namespace, SHA-256 indexes session tokens.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{CoreError, Result};

/// Size of capability keys, session tokens and token pads (256 bits).
pub const KEY_SIZE: usize = 32;

/// XOR two equal-length byte slices.
///
/// Fails with [`CoreError::LengthMismatch`] when the operands differ. The
/// typed credentials go through [`xor_fixed`] instead, where a mismatch
/// cannot be expressed.
pub fn xor(left: &[u8], right: &[u8]) -> Result<Vec<u8>> {
    if left.len() != right.len() {
        return Err(CoreError::LengthMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }
    Ok(left.iter().zip(right).map(|(a, b)| a ^ b).collect())
}

/// XOR two 256-bit values.
pub fn xor_fixed(left: &[u8; KEY_SIZE], right: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = left[i] ^ right[i];
    }
    out
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-512 of `data` (128 characters).
pub fn sha512_hex(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Draw `N` bytes from the operating system CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_xor_length_mismatch() {
        let err = xor(&[1, 2, 3], &[1, 2]).unwrap_err();
        assert_eq!(
            err,
            CoreError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_sha512_hex_known_vector() {
        // SHA-512("abc")
        assert_eq!(
            sha512_hex(b"abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_random_bytes_differ() {
        let a: [u8; 32] = random_bytes();
        let b: [u8; 32] = random_bytes();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn test_xor_is_an_involution(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let once = xor_fixed(&a, &b);
            prop_assert_eq!(xor_fixed(&once, &b), a);
            prop_assert_eq!(xor(&a, &b).unwrap(), once.to_vec());
        }
    }
}
