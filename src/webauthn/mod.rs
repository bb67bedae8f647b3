pub mod authenticator_data;
pub mod client_data;
pub(crate) mod cose;
pub mod types;
pub mod verify;

pub use authenticator_data::{AuthenticatorData, AuthenticatorFlags};
pub use client_data::ClientData;
pub use types::{
    AssertionResponse, AuthenticatorAssertionResponse, ChallengeContext, CredentialPublicKey,
    KeyError, StoredCredential,
};
pub use verify::{verify_assertion, CredentialLookup};

use serde::Serialize;

/// Why an assertion was rejected. Each variant is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectReason {
    #[error("malformed base64url encoding")]         MalformedEncoding,
    #[error("malformed clientDataJSON")]             MalformedClientData,
    #[error("malformed authenticatorData")]          MalformedAuthenticatorData,
    #[error("malformed DER signature")]              MalformedSignature,
    #[error("unsupported credential type")]          UnsupportedCredentialType,
    #[error("unknown credential")]                   UnknownCredential,
    #[error("user handle mismatch")]                 UserHandleMismatch,
    #[error("ceremony type mismatch")]               CeremonyTypeMismatch,
    #[error("challenge mismatch")]                   ChallengeMismatch,
    #[error("origin mismatch")]                      OriginMismatch,
    #[error("token binding mismatch")]               TokenBindingMismatch,
    #[error("rpIdHash mismatch")]                    RpIdHashMismatch,
    #[error("user verification required")]          UserVerificationRequired,
    #[error("user not present")]                     UserNotPresent,
    #[error("invalid signature")]                    SignatureInvalid,
    #[error("possible cloned authenticator (stored counter {stored}, observed {observed})")]
    PossibleClonedAuthenticator { stored: u32, observed: u32 },
}

impl RejectReason {
    /// The one reason the caller must act on beyond failing the sign-in.
    pub fn is_possible_clone(&self) -> bool {
        matches!(self, Self::PossibleClonedAuthenticator { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum VerificationOutcome {
    /// `counter` is the authenticator's signCount; the caller persists it.
    Accepted { counter: u32 },
    Rejected(RejectReason),
}

impl VerificationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn counter(&self) -> Option<u32> {
        match self {
            Self::Accepted { counter } => Some(*counter),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_json_shape() {
        let accepted = serde_json::to_value(VerificationOutcome::Accepted { counter: 6 }).unwrap();
        assert_eq!(accepted, serde_json::json!({"outcome": "accepted", "counter": 6}));

        let rejected =
            serde_json::to_value(VerificationOutcome::Rejected(RejectReason::ChallengeMismatch))
                .unwrap();
        assert_eq!(
            rejected,
            serde_json::json!({"outcome": "rejected", "reason": "challengeMismatch"})
        );

        let clone = serde_json::to_value(VerificationOutcome::Rejected(
            RejectReason::PossibleClonedAuthenticator { stored: 10, observed: 3 },
        ))
        .unwrap();
        assert_eq!(
            clone,
            serde_json::json!({
                "outcome": "rejected",
                "reason": "possibleClonedAuthenticator",
                "stored": 10,
                "observed": 3
            })
        );
    }

    #[test]
    fn test_only_clone_reason_is_flagged() {
        let clone = RejectReason::PossibleClonedAuthenticator { stored: 1, observed: 1 };
        assert!(clone.is_possible_clone());
        assert!(!RejectReason::SignatureInvalid.is_possible_clone());
    }
}
