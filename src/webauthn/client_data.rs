use serde::Deserialize;

/// Parsed `clientDataJSON`. Unknown members are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    #[serde(rename = "type")]
    pub ceremony_type: String,
    /// base64url, as sent by the client.
    pub challenge: String,
    pub origin: String,
    #[serde(default)]
    pub cross_origin: Option<bool>,
    #[serde(default)]
    pub token_binding: Option<TokenBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenBinding {
    pub status: TokenBindingStatus,
    /// base64url token binding id; required when `status` is `present`.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    Present,
    Supported,
    NotSupported,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientDataError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level value is not an object")]
    NotAnObject,
    #[error("tokenBinding status is present but id is missing")]
    MissingTokenBindingId,
}

pub fn parse(bytes: &[u8]) -> Result<ClientData, ClientDataError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if !value.is_object() {
        return Err(ClientDataError::NotAnObject);
    }
    let client_data: ClientData = serde_json::from_value(value)?;
    if let Some(TokenBinding {
        status: TokenBindingStatus::Present,
        id: None,
    }) = client_data.token_binding
    {
        return Err(ClientDataError::MissingTokenBindingId);
    }
    Ok(client_data)
}
