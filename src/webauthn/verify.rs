//! Assertion verification.
//!
//! Every check is a step returning `Result<_, RejectReason>`; the first
//! failure ends the pipeline. Only collaborator failures (credential lookup)
//! surface as [`crate::error::Error`].

use p256::ecdsa::signature::Verifier as _;
use p256::ecdsa::Signature;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::client_data::{self, ClientData, TokenBinding, TokenBindingStatus};
use super::{authenticator_data, ChallengeContext, RejectReason, StoredCredential};
use super::{AssertionResponse, CredentialPublicKey, VerificationOutcome};
use crate::codec::{base64url, der, hex, CodecError};
use crate::config::{ASSERTION_CEREMONY_TYPE, PUBLIC_KEY_CREDENTIAL_TYPE};
use crate::error::Error;

/// Resolves a credential id to the stored credential.
pub trait CredentialLookup {
    /// `Ok(None)` for an unknown id; `Err` only when the lookup itself failed.
    fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>, Error>;
}

impl CredentialLookup for StoredCredential {
    fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>, Error> {
        Ok(constant_time_eq(&self.credential_id, credential_id).then(|| self.clone()))
    }
}

impl CredentialLookup for [StoredCredential] {
    fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>, Error> {
        Ok(self
            .iter()
            .find(|c| constant_time_eq(&c.credential_id, credential_id))
            .cloned())
    }
}

/// Verify one assertion against the context issued for its ceremony.
///
/// The context is consumed. The stored credential is never modified: on
/// `Accepted` the caller persists the returned counter.
pub fn verify_assertion<L>(
    response: &AssertionResponse,
    context: ChallengeContext,
    credentials: &L,
) -> Result<VerificationOutcome, Error>
where
    L: CredentialLookup + ?Sized,
{
    let credential_id = match check_credential_type(response)
        .and_then(|()| response.credential_id().map_err(malformed_encoding))
    {
        Ok(id) => id,
        Err(reason) => return Ok(reject(reason, None)),
    };

    let Some(credential) = credentials.find_credential(&credential_id)? else {
        return Ok(reject(RejectReason::UnknownCredential, Some(&credential_id)));
    };

    match check_assertion(response, &context, &credential) {
        Ok(counter) => {
            tracing::info!(
                credential = %hex(&credential_id),
                counter,
                "Assertion accepted"
            );
            Ok(VerificationOutcome::Accepted { counter })
        }
        Err(reason) => Ok(reject(reason, Some(&credential_id))),
    }
}

fn reject(reason: RejectReason, credential_id: Option<&[u8]>) -> VerificationOutcome {
    let credential = credential_id.map(hex).unwrap_or_default();
    if reason.is_possible_clone() {
        tracing::warn!(%credential, %reason, "Signature counter did not advance");
    } else {
        tracing::debug!(%credential, %reason, "Assertion rejected");
    }
    VerificationOutcome::Rejected(reason)
}

fn check_credential_type(response: &AssertionResponse) -> Result<(), RejectReason> {
    if response.credential_type != PUBLIC_KEY_CREDENTIAL_TYPE {
        return Err(RejectReason::UnsupportedCredentialType);
    }
    Ok(())
}

/// Steps after the credential lookup. Returns the counter to persist.
fn check_assertion(
    response: &AssertionResponse,
    context: &ChallengeContext,
    credential: &StoredCredential,
) -> Result<u32, RejectReason> {
    if let Some(user_handle) = response.user_handle().map_err(malformed_encoding)? {
        if !constant_time_eq(&user_handle, &credential.user_handle) {
            return Err(RejectReason::UserHandleMismatch);
        }
    }

    let client_data_json =
        base64url::decode(&response.response.client_data_json).map_err(malformed_encoding)?;
    let client_data = client_data::parse(&client_data_json).map_err(|e| {
        tracing::debug!(error = %e, "clientDataJSON did not parse");
        RejectReason::MalformedClientData
    })?;
    check_client_data(&client_data, context)?;

    let auth_data_raw =
        base64url::decode(&response.response.authenticator_data).map_err(malformed_encoding)?;
    let auth_data = authenticator_data::parse(&auth_data_raw).map_err(|e| {
        tracing::debug!(error = %e, "authenticatorData did not parse");
        RejectReason::MalformedAuthenticatorData
    })?;

    let rp_id_hash = Sha256::digest(context.rp_id.as_bytes());
    if !constant_time_eq(&auth_data.rp_id_hash, &rp_id_hash) {
        return Err(RejectReason::RpIdHashMismatch);
    }

    if context.require_user_verification {
        if !auth_data.flags.user_verified() {
            return Err(RejectReason::UserVerificationRequired);
        }
    } else if !auth_data.flags.user_present() {
        return Err(RejectReason::UserNotPresent);
    }

    // Client extension outputs are not evaluated.

    let client_data_hash = Sha256::digest(&client_data_json);
    let mut signed = Vec::with_capacity(auth_data_raw.len() + client_data_hash.len());
    signed.extend_from_slice(&auth_data_raw);
    signed.extend_from_slice(&client_data_hash);

    let signature = base64url::decode(&response.response.signature).map_err(malformed_encoding)?;
    verify_signature(&credential.public_key, &signed, &signature)?;

    check_counter(credential.sign_count, auth_data.counter)
}

fn check_client_data(
    client_data: &ClientData,
    context: &ChallengeContext,
) -> Result<(), RejectReason> {
    if client_data.ceremony_type != ASSERTION_CEREMONY_TYPE {
        return Err(RejectReason::CeremonyTypeMismatch);
    }

    let challenge = base64url::decode(&client_data.challenge).map_err(malformed_encoding)?;
    if !constant_time_eq(&challenge, &context.challenge) {
        return Err(RejectReason::ChallengeMismatch);
    }

    if client_data.origin != context.origin {
        return Err(RejectReason::OriginMismatch);
    }
    if client_data.cross_origin == Some(true) && !context.allow_cross_origin {
        return Err(RejectReason::OriginMismatch);
    }

    check_token_binding(client_data, context)
}

/// Skipped unless the deployment expects a token binding id.
fn check_token_binding(
    client_data: &ClientData,
    context: &ChallengeContext,
) -> Result<(), RejectReason> {
    let Some(expected) = &context.token_binding_id else {
        return Ok(());
    };
    match &client_data.token_binding {
        Some(TokenBinding {
            status: TokenBindingStatus::Present,
            id: Some(id),
        }) => {
            let id = base64url::decode(id).map_err(malformed_encoding)?;
            if constant_time_eq(&id, expected) {
                Ok(())
            } else {
                Err(RejectReason::TokenBindingMismatch)
            }
        }
        _ => Err(RejectReason::TokenBindingMismatch),
    }
}

fn verify_signature(
    public_key: &CredentialPublicKey,
    message: &[u8],
    der_signature: &[u8],
) -> Result<(), RejectReason> {
    let raw = der::to_raw(der_signature, public_key.coordinate_width()).map_err(|e| {
        tracing::debug!(error = %e, "signature did not decode");
        RejectReason::MalformedSignature
    })?;
    // r or s equal to zero, or not below the group order
    let signature = Signature::from_slice(&raw).map_err(|_| RejectReason::SignatureInvalid)?;
    let key = public_key.verifying_key().map_err(|e| {
        tracing::error!(error = %e, "stored public key is unusable");
        RejectReason::SignatureInvalid
    })?;
    key.verify(message, &signature)
        .map_err(|_| RejectReason::SignatureInvalid)
}

/// Zero/zero marks an authenticator without a counter.
fn check_counter(stored: u32, observed: u32) -> Result<u32, RejectReason> {
    if observed > stored || (observed == 0 && stored == 0) {
        Ok(observed)
    } else {
        Err(RejectReason::PossibleClonedAuthenticator { stored, observed })
    }
}

fn malformed_encoding(e: CodecError) -> RejectReason {
    tracing::debug!(error = %e, "base64url field did not decode");
    RejectReason::MalformedEncoding
}

/// Content comparison whose timing depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
