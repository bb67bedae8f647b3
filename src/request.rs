use serde::Deserialize;

use crate::codec::base64url;
use crate::error::{Error, Result};
use crate::webauthn::{AssertionResponse, ChallengeContext, CredentialPublicKey, StoredCredential};

/// One self-contained verification, as read by the command line front end.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub response: AssertionResponse,
    pub context: RequestContext,
    pub credential: RequestCredential,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub rp_id: String,
    pub origin: String,
    /// base64url
    pub challenge: String,
    #[serde(default)]
    pub require_user_verification: bool,
    #[serde(default)]
    pub allow_cross_origin: bool,
    #[serde(default)]
    pub token_binding_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCredential {
    /// base64url
    pub id: String,
    /// base64url
    pub user_handle: String,
    /// base64url COSE_Key
    pub public_key: String,
    pub sign_count: u32,
}

impl VerifyRequest {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn into_parts(self) -> Result<(AssertionResponse, ChallengeContext, StoredCredential)> {
        let ctx = self.context;
        let challenge = field("context.challenge", &ctx.challenge)?;
        let mut context = ChallengeContext::new(ctx.rp_id, ctx.origin, challenge)
            .with_user_verification(ctx.require_user_verification)
            .with_cross_origin(ctx.allow_cross_origin);
        if let Some(id) = &ctx.token_binding_id {
            context = context.with_token_binding_id(field("context.tokenBindingId", id)?);
        }

        let cred = self.credential;
        let cose = field("credential.publicKey", &cred.public_key)?;
        let public_key = CredentialPublicKey::from_cose_key(&cose)
            .map_err(|e| Error::InvalidRequest(format!("credential.publicKey: {e}")))?;
        let credential = StoredCredential {
            credential_id: field("credential.id", &cred.id)?,
            user_handle: field("credential.userHandle", &cred.user_handle)?,
            public_key,
            sign_count: cred.sign_count,
        };

        Ok((self.response, context, credential))
    }
}

fn field(name: &str, value: &str) -> Result<Vec<u8>> {
    base64url::decode(value).map_err(|e| Error::InvalidRequest(format!("{name}: {e}")))
}
