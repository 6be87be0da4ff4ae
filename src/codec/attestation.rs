//! Attestation object (WebAuthn §6.5): a CBOR map
//! `{ "fmt": text, "authData": bytes, "attStmt": map }`.

use super::authenticator_data::{decode_authenticator_data, AuthenticatorData};
use super::{cbor_exact, cbor_map, take_entry, MapKey};
use crate::error::DecodeError;
use ciborium::value::Value;
use std::fmt;

/// Entry limits for the attestation object and its statement. The defined
/// formats use at most a handful of keys.
const MAX_OBJECT_ENTRIES: usize = 16;
const MAX_STATEMENT_ENTRIES: usize = 16;

/// Attestation statement format identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationFormat {
    None,
    Packed,
    FidoU2f,
    AndroidKey,
    AndroidSafetyNet,
    Tpm,
    Apple,
    /// Registered by some future authenticator; kept verbatim.
    Other(String),
}

impl From<&str> for AttestationFormat {
    fn from(fmt: &str) -> Self {
        match fmt {
            "none" => AttestationFormat::None,
            "packed" => AttestationFormat::Packed,
            "fido-u2f" => AttestationFormat::FidoU2f,
            "android-key" => AttestationFormat::AndroidKey,
            "android-safetynet" => AttestationFormat::AndroidSafetyNet,
            "tpm" => AttestationFormat::Tpm,
            "apple" => AttestationFormat::Apple,
            other => AttestationFormat::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttestationFormat::None => "none",
            AttestationFormat::Packed => "packed",
            AttestationFormat::FidoU2f => "fido-u2f",
            AttestationFormat::AndroidKey => "android-key",
            AttestationFormat::AndroidSafetyNet => "android-safetynet",
            AttestationFormat::Tpm => "tpm",
            AttestationFormat::Apple => "apple",
            AttestationFormat::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Decoded attestation object.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub format: AttestationFormat,
    pub auth_data: AuthenticatorData,
    /// `attStmt` entries keyed by their text label.
    pub statement: Vec<(String, Value)>,
}

impl AttestationObject {
    /// Look up an attestation statement entry.
    pub fn statement_entry(&self, key: &str) -> Option<&Value> {
        self.statement
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Decode an attestation object occupying `bytes` exactly.
///
/// Unknown top-level keys are ignored; the three defined ones are required.
pub fn decode_attestation_object(bytes: &[u8]) -> Result<AttestationObject, DecodeError> {
    let mut entries = cbor_map(cbor_exact(bytes)?, "attestationObject", MAX_OBJECT_ENTRIES)?;

    let format = match take_entry(&mut entries, &MapKey::Text("fmt".into())) {
        Some(Value::Text(fmt)) => AttestationFormat::from(fmt.as_str()),
        Some(_) => return Err(DecodeError::UnexpectedType("fmt")),
        None => return Err(DecodeError::MissingField("fmt")),
    };

    let auth_data = match take_entry(&mut entries, &MapKey::Text("authData".into())) {
        Some(Value::Bytes(raw)) => decode_authenticator_data(&raw)?,
        Some(_) => return Err(DecodeError::UnexpectedType("authData")),
        None => return Err(DecodeError::MissingField("authData")),
    };

    let statement = match take_entry(&mut entries, &MapKey::Text("attStmt".into())) {
        Some(stmt) => cbor_map(stmt, "attStmt", MAX_STATEMENT_ENTRIES)?
            .into_iter()
            .map(|(k, v)| match k {
                MapKey::Text(k) => Ok((k, v)),
                MapKey::Int(_) => Err(DecodeError::UnexpectedType("attStmt")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => return Err(DecodeError::MissingField("attStmt")),
    };

    Ok(AttestationObject {
        format,
        auth_data,
        statement,
    })
}
