//! # WebAuthn API Types
//!
//! Request/response types exchanged with the browser. Binary fields travel as
//! base64url strings inside JSON; `Base64UrlBytes` does that conversion at the
//! serde boundary so the ceremonies only ever see bytes.

use crate::codec::{base64url_decode, base64url_encode};
use crate::config::UserVerification;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bytes that are base64url text on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Base64UrlBytes(pub Vec<u8>);

impl Base64UrlBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64UrlBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for Base64UrlBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Unpadded base64url, what the browser-side helpers expect
        serializer.serialize_str(&base64url_encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Base64UrlBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Invalid base64url becomes a serde error, i.e. a JSON rejection
        let text = String::deserialize(deserializer)?;
        base64url_decode(&text, "base64url field")
            .map(Base64UrlBytes)
            .map_err(serde::de::Error::custom)
    }
}

/// Relying party entity shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

/// User entity; `id` is the random user handle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: Base64UrlBytes,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub alg: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub authenticator_attachment: &'static str,
    pub resident_key: &'static str,
    pub require_resident_key: bool,
    pub user_verification: UserVerification,
}

/// `PublicKeyCredentialCreationOptions` for `navigator.credentials.create()`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: Base64UrlBytes,
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub timeout: u64,
    pub authenticator_selection: AuthenticatorSelection,
    pub attestation: &'static str,
}

/// Credential the browser may use for an assertion.
#[derive(Debug, Clone, Serialize)]
pub struct AllowCredential {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub id: Base64UrlBytes,
}

/// `PublicKeyCredentialRequestOptions` for `navigator.credentials.get()`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionOptions {
    pub challenge: Base64UrlBytes,
    pub timeout: u64,
    pub rp_id: String,
    pub user_verification: UserVerification,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_credentials: Vec<AllowCredential>,
}

/// `AuthenticatorAttestationResponse` as the browser serializes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlBytes,
    pub attestation_object: Base64UrlBytes,
}

/// Result of `navigator.credentials.create()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCredential {
    pub id: String,
    pub raw_id: Base64UrlBytes,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AttestationResponse,
}

/// `AuthenticatorAssertionResponse` as the browser serializes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlBytes,
    pub authenticator_data: Base64UrlBytes,
    pub signature: Base64UrlBytes,
    #[serde(default)]
    pub user_handle: Option<Base64UrlBytes>,
}

/// Result of `navigator.credentials.get()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionCredential {
    pub id: String,
    pub raw_id: Base64UrlBytes,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AssertionResponse,
}

/// Body of the two verification endpoints: `{ "credential": { ... } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEnvelope<T> {
    pub credential: T,
}

/// Outcome of a successful assertion.
///
/// The caller persists `sign_count` on the stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub credential_id: Vec<u8>,
    pub user_handle: Vec<u8>,
    pub sign_count: u32,
    pub user_verified: bool,
}
