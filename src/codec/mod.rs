//! # Binary Codec
//!
//! Fail-closed decoders for the structures an authenticator hands back through
//! the browser. Every byte here is attacker controlled, so:
//! - every length is checked against what is actually left in the buffer
//! - trailing bytes are an error, not something to ignore
//! - an error never comes with a half-filled struct
//!
//! ## Submodules
//! - `authenticator_data`: the fixed 37-byte header plus attested credential data
//! - `attestation`: the CBOR attestation object returned at registration
//! - `cose`: COSE_Key public keys (ES256 and RS256)
//! - `client_data`: the `clientDataJSON` the browser signs over

pub mod attestation;
pub mod authenticator_data;
pub mod client_data;
pub mod cose;

pub use attestation::{decode_attestation_object, AttestationFormat, AttestationObject};
pub use authenticator_data::{
    decode_authenticator_data, AttestedCredentialData, AuthenticatorData, AuthenticatorFlags,
};
pub use client_data::{decode_client_data, ClientData, ClientDataType};
pub use cose::{decode_cose_key, CoseAlgorithm, CoseKey, CosePublicKey};

use crate::error::DecodeError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use ciborium::value::Value;
use std::collections::HashSet;

/// base64url engine that emits no padding and accepts input with or without it.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
pub fn base64url_encode(data: &[u8]) -> String {
    BASE64URL.encode(data)
}

/// Decode base64url (padding optional). `field` names the input in the error.
pub fn base64url_decode(input: &str, field: &'static str) -> Result<Vec<u8>, DecodeError> {
    BASE64URL
        .decode(input.as_bytes())
        .map_err(|_| DecodeError::Base64(field))
}

/// Decode exactly one CBOR item from the front of `input`.
///
/// Returns the item and the number of bytes it occupied, so callers can keep
/// walking a buffer that has more data after the item.
pub(crate) fn cbor_prefix(input: &[u8]) -> Result<(Value, usize), DecodeError> {
    let mut reader = input;
    let value: Value =
        ciborium::from_reader(&mut reader).map_err(|e| DecodeError::Cbor(e.to_string()))?;
    Ok((value, input.len() - reader.len()))
}

/// Decode one CBOR item that must fill `input` completely.
pub(crate) fn cbor_exact(input: &[u8]) -> Result<Value, DecodeError> {
    let (value, used) = cbor_prefix(input)?;
    if used != input.len() {
        return Err(DecodeError::TrailingBytes(input.len() - used));
    }
    Ok(value)
}

/// Map key of a CBOR map, either an integer label (COSE) or a text key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MapKey {
    Int(i128),
    Text(String),
}

impl MapKey {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(MapKey::Int(i128::from(*i))),
            Value::Text(t) => Some(MapKey::Text(t.clone())),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            MapKey::Int(i) => i.to_string(),
            MapKey::Text(t) => t.clone(),
        }
    }
}

/// Flatten a CBOR map into `(key, value)` pairs, rejecting duplicate keys and
/// keys that are neither integers nor text.
///
/// Maps with more than `max_entries` entries are rejected before any key is
/// looked at; every map decoded here has a small, known shape.
pub(crate) fn cbor_map(
    value: Value,
    field: &'static str,
    max_entries: usize,
) -> Result<Vec<(MapKey, Value)>, DecodeError> {
    let Value::Map(entries) = value else {
        return Err(DecodeError::UnexpectedType(field));
    };
    if entries.len() > max_entries {
        return Err(DecodeError::TooManyEntries {
            field,
            max: max_entries,
        });
    }

    // Duplicate check in one pass
    let mut seen = HashSet::with_capacity(entries.len());
    let mut out: Vec<(MapKey, Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let key = MapKey::from_value(&k).ok_or(DecodeError::UnexpectedType(field))?;
        if !seen.insert(key.clone()) {
            return Err(DecodeError::DuplicateField(key.describe()));
        }
        out.push((key, v));
    }
    Ok(out)
}

/// Remove and return the entry for `key`, if present.
pub(crate) fn take_entry(entries: &mut Vec<(MapKey, Value)>, key: &MapKey) -> Option<Value> {
    let pos = entries.iter().position(|(k, _)| k == key)?;
    Some(entries.swap_remove(pos).1)
}

/// Bounds-checked cursor over a byte slice.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        self.buf
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.buf.len() {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn advance(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n).map(|_| ())
    }
}
