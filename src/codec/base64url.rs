use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use super::CodecError;

/// Accepts unpadded input, or input carrying exactly the canonical `=` padding.
pub fn decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let engine = if input.contains('=') {
        &URL_SAFE
    } else {
        &URL_SAFE_NO_PAD
    };
    engine
        .decode(input.as_bytes())
        .map_err(|e| CodecError::MalformedEncoding(e.to_string()))
}

/// Never pads.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
