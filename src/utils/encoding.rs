use base64::{engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL}, Engine};
use thiserror::Error;

/// Length in bytes of a payment hash / preimage
pub const HASH_LEN: usize = 32;

/// Hash encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Hex decode error: {0}")]
    HexDecode(String),
    #[error("Base64 decode error: {0}")]
    Base64Decode(String),
    #[error("Invalid hash length: expected {HASH_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// A payment hash as supplied by the caller.
///
/// The caller states which encoding the string uses; nothing is inferred from
/// the shape of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentHashInput {
    Hex(String),
    Base64(String),
}

impl PaymentHashInput {
    /// Decode into the raw 32 hash bytes
    pub fn to_bytes(&self) -> Result<[u8; HASH_LEN], EncodingError> {
        let bytes = match self {
            PaymentHashInput::Hex(s) => {
                hex::decode(s.trim()).map_err(|e| EncodingError::HexDecode(e.to_string()))?
            }
            PaymentHashInput::Base64(s) => decode_base64(s.trim())?,
        };

        let len = bytes.len();
        bytes.try_into().map_err(|_| EncodingError::InvalidLength(len))
    }

    /// Lower-case hex, the form payments carry `payment_hash` in
    pub fn to_hex(&self) -> Result<String, EncodingError> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// URL-safe base64, the form REST path segments expect
    pub fn to_url_safe_base64(&self) -> Result<String, EncodingError> {
        Ok(BASE64_URL.encode(self.to_bytes()?))
    }
}

/// Decode base64 in either the standard or the URL-safe alphabet
fn decode_base64(s: &str) -> Result<Vec<u8>, EncodingError> {
    BASE64
        .decode(s)
        .or_else(|_| BASE64_URL.decode(s))
        .map_err(|e| EncodingError::Base64Decode(e.to_string()))
}

/// Convert a base64 byte field from a REST body (e.g. invoice `r_hash`) to hex.
///
/// Returns the input unchanged when it is not valid base64 so records are never
/// dropped over an encoding surprise.
pub fn base64_field_to_hex(field: &str) -> String {
    match decode_base64(field) {
        Ok(bytes) => hex::encode(bytes),
        Err(_) => field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_HEX: &str = "0001020304050607080910111213141516171819202122232425262728293031";

    #[test]
    fn test_hex_round_trips_to_base64() {
        let input = PaymentHashInput::Hex(HASH_HEX.to_string());
        let b64 = input.to_url_safe_base64().expect("encode failed");

        let back = PaymentHashInput::Base64(b64).to_hex().expect("decode failed");
        assert_eq!(back, HASH_HEX);
    }

    #[test]
    fn test_standard_and_url_safe_alphabets_accepted() {
        let bytes = [0xfbu8; HASH_LEN];
        let standard = BASE64.encode(bytes);
        let url_safe = BASE64_URL.encode(bytes);
        assert_ne!(standard, url_safe);

        assert_eq!(PaymentHashInput::Base64(standard).to_bytes().unwrap(), bytes);
        assert_eq!(PaymentHashInput::Base64(url_safe).to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = PaymentHashInput::Hex("abcd".to_string()).to_bytes().unwrap_err();
        assert_eq!(err, EncodingError::InvalidLength(2));
    }

    #[test]
    fn test_hex_input_is_not_guessed_as_base64() {
        // valid base64 too, but the caller said hex
        let err = PaymentHashInput::Hex("AAAA".to_string()).to_bytes().unwrap_err();
        assert_eq!(err, EncodingError::InvalidLength(2));
    }

    #[test]
    fn test_base64_field_to_hex() {
        let b64 = BASE64.encode([0xab, 0xcd]);
        assert_eq!(base64_field_to_hex(&b64), "abcd");
        assert_eq!(base64_field_to_hex("not base64!"), "not base64!");
    }
}
