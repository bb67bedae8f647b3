pub mod base64url;
pub mod der;

/// Lowercase hex, for file names, tokens and log fields.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed base64url: {0}")]
    MalformedEncoding(String),
    #[error("malformed DER signature: {0}")]
    MalformedSignature(&'static str),
}
