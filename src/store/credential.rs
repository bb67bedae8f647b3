use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::webauthn::{CredentialPublicKey, StoredCredential};

pub(crate) const RECORD_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub version:       u8,
    pub credential_id: Vec<u8>,
    pub user_handle:   Vec<u8>,
    pub rp_id:         String,
    pub public_key_x:  Vec<u8>,      // P-256 x, 32 bytes
    pub public_key_y:  Vec<u8>,      // P-256 y, 32 bytes
    pub sign_count:    u32,
    pub disabled:      bool,
    pub created_at:    u64,          // Unix timestamp
}

impl CredentialRecord {
    pub fn new(
        credential: &StoredCredential,
        rp_id: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            credential_id: credential.credential_id.clone(),
            user_handle: credential.user_handle.clone(),
            rp_id: rp_id.into(),
            public_key_x: credential.public_key.x().to_vec(),
            public_key_y: credential.public_key.y().to_vec(),
            sign_count: credential.sign_count,
            disabled: false,
            created_at,
        }
    }

    pub fn to_stored_credential(&self) -> Result<StoredCredential, StoreError> {
        let public_key =
            CredentialPublicKey::from_coordinates(&self.public_key_x, &self.public_key_y)
            .map_err(|e| StoreError::Corrupt(format!("public key: {e}")))?;
        Ok(StoredCredential {
            credential_id: self.credential_id.clone(),
            user_handle: self.user_handle.clone(),
            public_key,
            sign_count: self.sign_count,
        })
    }
}
