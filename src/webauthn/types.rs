use p256::ecdsa::VerifyingKey;
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};

use super::cose;
use crate::codec::{base64url, hex, CodecError};
use crate::config::P256_COORDINATE_WIDTH;

/// `PublicKeyCredential` returned by `navigator.credentials.get()`, as posted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<String>,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: AuthenticatorAssertionResponse,
}

/// All fields are base64url.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(alias = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

impl AssertionResponse {
    /// Credential id from `rawId`, cross-checked against `id` when both are sent.
    pub fn credential_id(&self) -> Result<Vec<u8>, CodecError> {
        let id = base64url::decode(&self.id)?;
        match &self.raw_id {
            Some(raw_id) => {
                let raw = base64url::decode(raw_id)?;
                if raw != id {
                    return Err(CodecError::MalformedEncoding("id and rawId differ".into()));
                }
                Ok(raw)
            }
            None => Ok(id),
        }
    }

    /// `None` when the authenticator sent no user handle (absent, null or empty).
    pub fn user_handle(&self) -> Result<Option<Vec<u8>>, CodecError> {
        match self.response.user_handle.as_deref() {
            None | Some("") => Ok(None),
            Some(handle) => base64url::decode(handle).map(Some),
        }
    }
}

/// Expectations bound to one in-flight ceremony. Not `Clone`: it is consumed by
/// the verifier so that a context cannot be checked twice.
#[derive(Debug, PartialEq, Eq)]
pub struct ChallengeContext {
    pub rp_id: String,
    pub origin: String,
    pub challenge: Vec<u8>,
    pub require_user_verification: bool,
    pub allow_cross_origin: bool,
    pub token_binding_id: Option<Vec<u8>>,
}

impl ChallengeContext {
    pub fn new(rp_id: impl Into<String>, origin: impl Into<String>, challenge: Vec<u8>) -> Self {
        Self {
            rp_id: rp_id.into(),
            origin: origin.into(),
            challenge,
            require_user_verification: false,
            allow_cross_origin: false,
            token_binding_id: None,
        }
    }

    pub fn with_user_verification(mut self, required: bool) -> Self {
        self.require_user_verification = required;
        self
    }

    pub fn with_cross_origin(mut self, allowed: bool) -> Self {
        self.allow_cross_origin = allowed;
        self
    }

    pub fn with_token_binding_id(mut self, id: Vec<u8>) -> Self {
        self.token_binding_id = Some(id);
        self
    }
}

/// A registered credential as the verifier needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub credential_id: Vec<u8>,
    /// Owning user's handle (`user.id` at registration).
    pub user_handle: Vec<u8>,
    pub public_key: CredentialPublicKey,
    pub sign_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("coordinate is {0} bytes, expected 32")]
    CoordinateLength(usize),
    #[error("point is not on the P-256 curve")]
    NotOnCurve,
    #[error("unsupported COSE {0}")]
    Unsupported(&'static str),
    #[error("COSE: {0}")]
    Cose(String),
}

/// Uncompressed P-256 public key. Construction guarantees the point is on the curve.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPublicKey {
    x: [u8; P256_COORDINATE_WIDTH],
    y: [u8; P256_COORDINATE_WIDTH],
}

impl CredentialPublicKey {
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<Self, KeyError> {
        let x: [u8; P256_COORDINATE_WIDTH] =
            x.try_into().map_err(|_| KeyError::CoordinateLength(x.len()))?;
        let y: [u8; P256_COORDINATE_WIDTH] =
            y.try_into().map_err(|_| KeyError::CoordinateLength(y.len()))?;
        let key = Self { x, y };
        key.verifying_key()?;
        Ok(key)
    }

    pub fn from_cose_key(bytes: &[u8]) -> Result<Self, KeyError> {
        let (x, y) = cose::decode_p256(bytes)?;
        Self::from_coordinates(&x, &y)
    }

    pub fn to_cose_key(&self) -> Result<Vec<u8>, KeyError> {
        cose::encode_p256(&self.x, &self.y)
    }

    pub fn x(&self) -> &[u8; P256_COORDINATE_WIDTH] {
        &self.x
    }

    pub fn y(&self) -> &[u8; P256_COORDINATE_WIDTH] {
        &self.y
    }

    /// Width of `r` and `s` in the raw signature form for this key's curve.
    pub fn coordinate_width(&self) -> usize {
        P256_COORDINATE_WIDTH
    }

    pub(crate) fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&self.x),
            FieldBytes::from_slice(&self.y),
            false,
        );
        VerifyingKey::from_encoded_point(&point).map_err(|_| KeyError::NotOnCurve)
    }
}

impl std::fmt::Debug for CredentialPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPublicKey")
            .field("x", &hex(&self.x))
            .field("y", &hex(&self.y))
            .finish()
    }
}
