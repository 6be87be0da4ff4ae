//! `clientDataJSON` (WebAuthn §5.8.1), the browser's record of what it asked
//! the authenticator to sign.

use super::base64url_decode;
use crate::error::DecodeError;
use serde::Deserialize;

/// Which ceremony the client data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ClientDataType {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

/// Token binding state reported by the browser. Parsed, not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenBinding {
    pub status: String,
    pub id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClientData {
    #[serde(rename = "type")]
    type_: ClientDataType,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: Option<bool>,
    #[serde(default)]
    token_binding: Option<TokenBinding>,
}

/// Decoded client data with the challenge already turned back into bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    pub type_: ClientDataType,
    pub challenge: Vec<u8>,
    pub origin: String,
    pub cross_origin: bool,
    pub token_binding: Option<TokenBinding>,
}

/// Parse the raw `clientDataJSON` bytes.
pub fn decode_client_data(bytes: &[u8]) -> Result<ClientData, DecodeError> {
    let raw: RawClientData =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Json(e.to_string()))?;

    Ok(ClientData {
        type_: raw.type_,
        challenge: base64url_decode(&raw.challenge, "challenge")?,
        origin: raw.origin,
        cross_origin: raw.cross_origin.unwrap_or(false),
        token_binding: raw.token_binding,
    })
}
