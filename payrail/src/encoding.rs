//! Base64 helpers for the serialized transaction wire format.
//!
//! Draft and signed transactions cross the HTTP boundary as standard base64
//! of the binary wire encoding. Kept in one place so both the assembler and
//! the broadcast loop agree on the alphabet.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

/// Encodes raw transaction bytes for transport.
#[must_use]
pub fn to_base64<T: AsRef<[u8]>>(bytes: T) -> String {
    B64.encode(bytes.as_ref())
}

/// Decodes a transport-encoded transaction back to raw bytes.
///
/// # Errors
///
/// Returns an error if the input is not valid standard base64.
pub fn from_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    B64.decode(encoded.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let bytes = vec![0u8, 1, 2, 250, 255];
        assert_eq!(from_base64(&to_base64(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn rejects_non_base64() {
        assert!(from_base64("not!base64!!").is_err());
    }
}
