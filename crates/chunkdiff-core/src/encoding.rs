//! Payload text encoding used on the wire: standard base64, no line wrapping.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn encode_payload(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_payload(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}
