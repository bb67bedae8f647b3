//! Encrypted credential records with an in-memory index. The signature
//! counter only moves through [`CredentialStore::compare_and_set_counter`].

pub mod credential;
mod disk;
pub mod index;

pub use credential::CredentialRecord;
pub use index::{CounterUpdate, CredentialStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize: {0}")]
    Serialization(String),
    #[error("Encrypt: {0}")]
    Encryption(String),
    #[error("Corrupt: {0}")]
    Corrupt(String),
    #[error("Not found")]
    NotFound,
    #[error("Credential id already registered")]
    Duplicate,
    #[error("Credential is disabled")]
    Disabled,
    #[error("Counter would move from {current} to {new}")]
    CounterRegression { current: u32, new: u32 },
}
