//! One file per credential: `{hex id}.bin` holding
//! `nonce(12) || AES-256-GCM(CBOR(record))`. The file stem is the AEAD
//! associated data, so a record only opens under its own name.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use std::path::{Path, PathBuf};

use super::{CredentialRecord, StoreError};
use crate::codec::hex;

const NONCE_LEN: usize = 12;
const EXTENSION: &str = "bin";

pub(crate) struct CredentialDir {
    cipher: Aes256Gcm,
    dir: PathBuf,
}

impl CredentialDir {
    pub(crate) fn new(aes_key: &[u8; 32], dir: PathBuf) -> Self {
        Self {
            cipher: Aes256Gcm::new(aes_key.into()),
            dir,
        }
    }

    fn path_for(&self, credential_id: &[u8]) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", hex(credential_id)))
    }

    /// Replace the record's file atomically (write `.tmp`, then rename).
    pub(crate) fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let mut plaintext = Vec::new();
        ciborium::into_writer(record, &mut plaintext)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let name = hex(&record.credential_id);
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| StoreError::Encryption(e.to_string()))?;

        let mut contents = nonce.to_vec();
        contents.extend_from_slice(&sealed);

        let path = self.path_for(&record.credential_id);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub(crate) fn open(&self, path: &Path) -> Result<CredentialRecord, StoreError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StoreError::Corrupt("file name is not UTF-8".into()))?;
        let contents = std::fs::read(path)?;
        if contents.len() < NONCE_LEN {
            return Err(StoreError::Corrupt("file too short".into()));
        }
        let (nonce, sealed) = contents.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| StoreError::Encryption(e.to_string()))?;
        let record: CredentialRecord = ciborium::from_reader(plaintext.as_slice())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if hex(&record.credential_id) != name {
            return Err(StoreError::Corrupt("record does not match its file name".into()));
        }
        Ok(record)
    }

    pub(crate) fn delete(&self, credential_id: &[u8]) -> Result<(), StoreError> {
        std::fs::remove_file(self.path_for(credential_id))?;
        Ok(())
    }

    /// Every record that opens; anything else is logged and skipped.
    pub(crate) fn load_all(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match self.open(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable credential file"
                    );
                }
            }
        }
        tracing::debug!(dir = %self.dir.display(), count = records.len(), "Credentials loaded");
        Ok(records)
    }
}
