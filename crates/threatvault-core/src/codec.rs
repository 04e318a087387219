//! Credential wire codec: base64url without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::crypto::KEY_SIZE;
use crate::error::{CoreError, Result};

/// Encode a 256-bit credential for transport.
pub fn encode_credential(bytes: &[u8; KEY_SIZE]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a credential header value.
///
/// Surrounding whitespace is ignored. Empty input, invalid base64url and
/// values that do not decode to exactly [`KEY_SIZE`] bytes are all rejected
/// the same way.
pub fn decode_credential(text: &str) -> Result<[u8; KEY_SIZE]> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::MalformedCredential("empty".into()));
    }
    let decoded = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| CoreError::MalformedCredential(e.to_string()))?;
    decoded.as_slice().try_into().map_err(|_| {
        CoreError::MalformedCredential(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            decoded.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encoding_has_no_padding() {
        let encoded = encode_credential(&[0xff; KEY_SIZE]);
        assert_eq!(encoded.len(), 43);
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let encoded = encode_credential(&[7; KEY_SIZE]);
        let decoded = decode_credential(&format!("  {}\n", encoded)).unwrap();
        assert_eq!(decoded, [7; KEY_SIZE]);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_credential("").is_err());
        assert!(decode_credential("   ").is_err());
        assert!(decode_credential("not base64 at all!").is_err());
        // 16 bytes: valid base64url, wrong size.
        assert!(decode_credential(&URL_SAFE_NO_PAD.encode([1u8; 16])).is_err());
        // Padded standard base64 is not accepted.
        assert!(decode_credential(&format!("{}=", encode_credential(&[1; KEY_SIZE]))).is_err());
    }

    proptest! {
        #[test]
        fn test_decode_inverts_encode(bytes in any::<[u8; 32]>()) {
            prop_assert_eq!(decode_credential(&encode_credential(&bytes)).unwrap(), bytes);
        }
    }
}
