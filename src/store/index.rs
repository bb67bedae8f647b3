use std::collections::HashMap;
use std::path::PathBuf;

use super::disk::CredentialDir;
use super::{CredentialRecord, StoreError};
use crate::error::Error;
use crate::codec::hex;
use crate::webauthn::{CredentialLookup, StoredCredential};

/// Result of [`CredentialStore::compare_and_set_counter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUpdate {
    Updated,
    /// Another verification already moved the counter.
    Stale { current: u32 },
}

pub struct CredentialStore {
    disk: CredentialDir,
    by_id: HashMap<Vec<u8>, CredentialRecord>,
    by_user: HashMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl CredentialStore {
    /// Load all credentials from disk into memory.
    pub fn load(aes_key: [u8; 32], creds_dir: PathBuf) -> Result<Self, StoreError> {
        let disk = CredentialDir::new(&aes_key, creds_dir);
        let records = disk.load_all()?;
        let mut store = Self {
            disk,
            by_id: HashMap::new(),
            by_user: HashMap::new(),
        };
        for record in records {
            store.index(record);
        }
        Ok(store)
    }

    fn index(&mut self, record: CredentialRecord) {
        self.by_user
            .entry(record.user_handle.clone())
            .or_default()
            .push(record.credential_id.clone());
        self.by_id.insert(record.credential_id.clone(), record);
    }

    /// Add new credential: write to disk and index in memory.
    pub fn add(&mut self, record: CredentialRecord) -> Result<(), StoreError> {
        if self.by_id.contains_key(&record.credential_id) {
            return Err(StoreError::Duplicate);
        }
        self.disk.save(&record)?;
        self.index(record);
        Ok(())
    }

    pub fn get_by_id(&self, id: &[u8]) -> Option<&CredentialRecord> {
        self.by_id.get(id)
    }

    /// All credentials of a user, most recent first.
    pub fn get_by_user(&self, user_handle: &[u8]) -> Vec<&CredentialRecord> {
        let ids = match self.by_user.get(user_handle) {
            Some(ids) => ids,
            None => return Vec::new(),
        };
        let mut records: Vec<&CredentialRecord> =
            ids.iter().filter_map(|id| self.by_id.get(id)).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Remove a credential by id; deletes from disk and memory index.
    pub fn remove(&mut self, id: &[u8]) -> Result<bool, StoreError> {
        let Some(record) = self.by_id.remove(id) else {
            return Ok(false);
        };
        self.disk.delete(&record.credential_id)?;
        if let Some(ids) = self.by_user.get_mut(&record.user_handle) {
            ids.retain(|i| i.as_slice() != id);
            if ids.is_empty() {
                self.by_user.remove(&record.user_handle);
            }
        }
        Ok(true)
    }

    pub fn credential_count(&self) -> usize {
        self.by_id.len()
    }

    /// Move the signature counter from `expected` to `new`, persisting before
    /// the in-memory record changes.
    ///
    /// Callers hold the store's lock for the whole call, which makes this the
    /// single point where a counter can advance.
    pub fn compare_and_set_counter(
        &mut self,
        id: &[u8],
        expected: u32,
        new: u32,
    ) -> Result<CounterUpdate, StoreError> {
        let record = self.by_id.get(id).ok_or(StoreError::NotFound)?;
        if record.disabled {
            return Err(StoreError::Disabled);
        }
        if record.sign_count != expected {
            return Ok(CounterUpdate::Stale {
                current: record.sign_count,
            });
        }
        if new < expected || (new == expected && new != 0) {
            return Err(StoreError::CounterRegression {
                current: expected,
                new,
            });
        }
        if new == expected {
            return Ok(CounterUpdate::Updated);
        }

        let mut updated = record.clone();
        updated.sign_count = new;
        self.disk.save(&updated)?;
        self.by_id.insert(updated.credential_id.clone(), updated);
        tracing::debug!(credential = %hex(id), counter = new, "Signature counter stored");
        Ok(CounterUpdate::Updated)
    }

    /// Mark a credential unusable. Returns false if it does not exist.
    pub fn disable(&mut self, id: &[u8]) -> Result<bool, StoreError> {
        let Some(record) = self.by_id.get(id) else {
            return Ok(false);
        };
        if record.disabled {
            return Ok(true);
        }
        let mut updated = record.clone();
        updated.disabled = true;
        self.disk.save(&updated)?;
        self.by_id.insert(updated.credential_id.clone(), updated);
        tracing::warn!(credential = %hex(id), "Credential disabled");
        Ok(true)
    }
}

impl CredentialLookup for CredentialStore {
    fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>, Error> {
        match self.get_by_id(credential_id) {
            Some(record) if !record.disabled => Ok(Some(record.to_stored_credential()?)),
            Some(_) => {
                tracing::debug!(credential = %hex(credential_id), "Credential is disabled");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
