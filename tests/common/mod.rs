#![allow(dead_code)]

use keyproof::codec::base64url;
use keyproof::webauthn::{
    AssertionResponse, AuthenticatorAssertionResponse, ChallengeContext, CredentialPublicKey,
    StoredCredential,
};
use p256::ecdsa::{signature::Signer as _, Signature, SigningKey};
use sha2::{Digest, Sha256};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_AT: u8 = 0x40;
pub const FLAG_ED: u8 = 0x80;

/// Software authenticator holding one P-256 credential.
pub struct TestAuthenticator {
    key: SigningKey,
    pub credential_id: Vec<u8>,
    pub user_handle: Vec<u8>,
}

impl TestAuthenticator {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_slice(&[seed; 32]).unwrap(),
            credential_id: vec![seed; 16],
            user_handle: format!("user-{seed}").into_bytes(),
        }
    }

    pub fn public_key(&self) -> CredentialPublicKey {
        let point = self.key.verifying_key().to_encoded_point(false);
        CredentialPublicKey::from_coordinates(point.x().unwrap(), point.y().unwrap()).unwrap()
    }

    pub fn stored(&self, sign_count: u32) -> StoredCredential {
        StoredCredential {
            credential_id: self.credential_id.clone(),
            user_handle: self.user_handle.clone(),
            public_key: self.public_key(),
            sign_count,
        }
    }

    /// Defaults describe an assertion every check accepts against [`context`].
    pub fn assertion(&self, challenge: &[u8], counter: u32) -> AssertionBuilder<'_> {
        AssertionBuilder {
            authenticator: self,
            ceremony_type: "webauthn.get".into(),
            challenge: challenge.to_vec(),
            origin: ORIGIN.into(),
            rp_id: RP_ID.into(),
            flags: FLAG_UP,
            counter,
            extra_client_data: String::new(),
            trailing_auth_data: Vec::new(),
            user_handle: None,
        }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sig: Signature = self.key.sign(message);
        sig.to_der().as_bytes().to_vec()
    }
}

pub struct AssertionBuilder<'a> {
    authenticator: &'a TestAuthenticator,
    pub ceremony_type: String,
    pub challenge: Vec<u8>,
    pub origin: String,
    pub rp_id: String,
    pub flags: u8,
    pub counter: u32,
    /// Raw JSON members appended to clientDataJSON, starting with a comma.
    pub extra_client_data: String,
    /// Bytes appended after the 37-byte header (signed along with it).
    pub trailing_auth_data: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

impl AssertionBuilder<'_> {
    pub fn client_data_json(&self) -> Vec<u8> {
        format!(
            r#"{{"type":"{}","challenge":"{}","origin":"{}"{}}}"#,
            self.ceremony_type,
            base64url::encode(&self.challenge),
            self.origin,
            self.extra_client_data,
        )
        .into_bytes()
    }

    pub fn authenticator_data(&self) -> Vec<u8> {
        let mut data = Sha256::digest(self.rp_id.as_bytes()).to_vec();
        data.push(self.flags);
        data.extend_from_slice(&self.counter.to_be_bytes());
        data.extend_from_slice(&self.trailing_auth_data);
        data
    }

    pub fn build(&self) -> AssertionResponse {
        let client_data_json = self.client_data_json();
        let auth_data = self.authenticator_data();
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature = self.authenticator.sign(&signed);

        let id = base64url::encode(&self.authenticator.credential_id);
        AssertionResponse {
            id: id.clone(),
            raw_id: Some(id),
            credential_type: "public-key".into(),
            response: AuthenticatorAssertionResponse {
                client_data_json: base64url::encode(&client_data_json),
                authenticator_data: base64url::encode(&auth_data),
                signature: base64url::encode(&signature),
                user_handle: self.user_handle.as_deref().map(base64url::encode),
            },
        }
    }
}

pub fn context(challenge: &[u8]) -> ChallengeContext {
    ChallengeContext::new(RP_ID, ORIGIN, challenge.to_vec())
}
