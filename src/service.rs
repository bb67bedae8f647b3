//! Caller side of the verifier: challenge bookkeeping, credential lookup and
//! the counter update that must follow an accepted assertion.

use serde::Serialize;
use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::challenge::ChallengeStore;
use crate::codec::{base64url, hex};
use crate::error::{Error, Result};
use crate::store::{CounterUpdate, CredentialStore, StoreError};
use crate::webauthn::{
    verify_assertion, AssertionResponse, CredentialLookup, RejectReason, StoredCredential,
    VerificationOutcome,
};

/// What the client needs to call `navigator.credentials.get()`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionChallenge {
    pub session_token: String,
    pub challenge: String,
    pub rp_id: String,
    pub allow_credentials: Vec<String>,
    pub user_verification: &'static str,
}

#[derive(Clone)]
pub struct AssertionService {
    credentials: Arc<Mutex<CredentialStore>>,
    challenges: Arc<Mutex<ChallengeStore>>,
}

impl AssertionService {
    pub fn new(
        credentials: Arc<Mutex<CredentialStore>>,
        challenges: Arc<Mutex<ChallengeStore>>,
    ) -> Self {
        Self {
            credentials,
            challenges,
        }
    }

    /// Issue a challenge. With a user handle, the user's enabled credentials are listed.
    pub fn begin(
        &self,
        rp_id: &str,
        origin: &str,
        require_user_verification: bool,
        user_handle: Option<&[u8]>,
    ) -> Result<AssertionChallenge> {
        let allow_credentials = match user_handle {
            Some(handle) => lock(&self.credentials, "credential store")?
                .get_by_user(handle)
                .into_iter()
                .filter(|r| !r.disabled)
                .map(|r| base64url::encode(&r.credential_id))
                .collect(),
            None => Vec::new(),
        };
        let mut challenges = lock(&self.challenges, "challenge store")?;
        let purged = challenges.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Dropped expired challenges");
        }
        let (session_token, challenge) =
            challenges.issue(rp_id, origin, require_user_verification);
        drop(challenges);
        Ok(AssertionChallenge {
            session_token,
            challenge: base64url::encode(&challenge),
            rp_id: rp_id.to_string(),
            allow_credentials,
            user_verification: if require_user_verification {
                "required"
            } else {
                "preferred"
            },
        })
    }

    /// Verify the client's response for `session_token` and persist the new counter.
    ///
    /// The session's challenge is spent whatever the outcome.
    pub fn finish(
        &self,
        session_token: &str,
        response: &AssertionResponse,
    ) -> Result<VerificationOutcome> {
        let context = lock(&self.challenges, "challenge store")?
            .take(session_token)
            .ok_or(Error::UnknownSession)?;

        let snapshot = Snapshot {
            store: &self.credentials,
            seen: RefCell::new(None),
        };
        let outcome = verify_assertion(response, context, &snapshot)?;
        self.settle(outcome, snapshot.seen.into_inner())
    }

    /// Persist the counter of an accepted assertion and disable a credential
    /// whose outcome says it may be cloned. `seen` is the credential the
    /// verifier was given, `None` when the lookup found nothing.
    fn settle(
        &self,
        outcome: VerificationOutcome,
        seen: Option<StoredCredential>,
    ) -> Result<VerificationOutcome> {
        let Some(credential) = seen else {
            return Ok(outcome);
        };
        let outcome = match outcome {
            VerificationOutcome::Accepted { counter } => {
                self.store_counter(&credential, counter)?
            }
            rejected => rejected,
        };

        if let VerificationOutcome::Rejected(reason) = &outcome {
            if reason.is_possible_clone() {
                let id = &credential.credential_id;
                tracing::warn!(
                    credential = %hex(id),
                    %reason,
                    "Disabling possibly cloned credential"
                );
                lock(&self.credentials, "credential store")?.disable(id)?;
            }
        }
        Ok(outcome)
    }

    /// Compare-and-set keyed on the counter seen at lookup. If a concurrent
    /// verification got there first, the observed counter must still be ahead
    /// of the one it stored.
    fn store_counter(
        &self,
        credential: &StoredCredential,
        counter: u32,
    ) -> Result<VerificationOutcome> {
        let mut store = lock(&self.credentials, "credential store")?;
        let id = &credential.credential_id;
        let update = match store.compare_and_set_counter(id, credential.sign_count, counter) {
            Ok(CounterUpdate::Stale { current }) if counter > current => {
                store.compare_and_set_counter(id, current, counter)
            }
            other => other,
        };
        match update {
            Ok(CounterUpdate::Updated) => Ok(VerificationOutcome::Accepted { counter }),
            Ok(CounterUpdate::Stale { current }) => Ok(VerificationOutcome::Rejected(
                RejectReason::PossibleClonedAuthenticator {
                    stored: current,
                    observed: counter,
                },
            )),
            Err(StoreError::NotFound | StoreError::Disabled) => {
                tracing::debug!(credential = %hex(id), "Credential went away during verification");
                Ok(VerificationOutcome::Rejected(RejectReason::UnknownCredential))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Looks up under the store lock and remembers what the verifier was given.
struct Snapshot<'a> {
    store: &'a Mutex<CredentialStore>,
    seen: RefCell<Option<StoredCredential>>,
}

impl CredentialLookup for Snapshot<'_> {
    fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>> {
        let found = lock(self.store, "credential store")?.find_credential(credential_id)?;
        *self.seen.borrow_mut() = found.clone();
        Ok(found)
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Internal(format!("{what} mutex poisoned")))
}
