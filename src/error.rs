/// Infrastructure failures. Protocol-level problems with an assertion are
/// never reported here; they become a [`crate::webauthn::RejectReason`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("Credential lookup unavailable: {0}")]
    Lookup(String),
    #[error("Unknown or expired session")]
    UnknownSession,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
