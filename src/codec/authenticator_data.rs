//! Authenticator data (WebAuthn §6.1).
//!
//! Layout:
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, big-endian)
//! [ aaguid (16) | credIdLen (2, big-endian) | credId | COSE_Key ]   if AT
//! [ extensions (CBOR map) ]                                         if ED
//! ```

use super::cose::{cose_key_from_value, CoseKey};
use super::{cbor_map, cbor_prefix, Reader};
use crate::error::DecodeError;
use ciborium::value::Value;

/// Header length: rpIdHash + flags + signCount.
pub const HEADER_LEN: usize = 37;

/// Most extension outputs accepted in one authenticator data.
const MAX_EXTENSION_ENTRIES: usize = 32;

/// Largest credential id WebAuthn allows.
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// The flags byte of authenticator data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorFlags(pub u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 0x01;
    pub const USER_VERIFIED: u8 = 0x04;
    pub const BACKUP_ELIGIBLE: u8 = 0x08;
    pub const BACKUP_STATE: u8 = 0x10;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
    pub const EXTENSION_DATA: u8 = 0x80;

    pub fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    pub fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    pub fn backup_eligible(self) -> bool {
        self.0 & Self::BACKUP_ELIGIBLE != 0
    }

    pub fn backup_state(self) -> bool {
        self.0 & Self::BACKUP_STATE != 0
    }

    pub fn attested_credential_data(self) -> bool {
        self.0 & Self::ATTESTED_CREDENTIAL_DATA != 0
    }

    pub fn extension_data(self) -> bool {
        self.0 & Self::EXTENSION_DATA != 0
    }
}

/// Credential created during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub public_key: CoseKey,
}

/// Decoded authenticator data.
///
/// `raw` keeps the exact bytes; signatures are computed over them, never over
/// a re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub raw: Vec<u8>,
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorFlags,
    pub sign_count: u32,
    pub attested_credential: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

/// Decode authenticator data that occupies `bytes` exactly.
pub fn decode_authenticator_data(bytes: &[u8]) -> Result<AuthenticatorData, DecodeError> {
    let mut reader = Reader::new(bytes);

    let rp_id_hash: [u8; 32] = reader.take_array()?;
    let [flags] = reader.take_array::<1>()?;
    let flags = AuthenticatorFlags(flags);
    let sign_count = u32::from_be_bytes(reader.take_array()?);

    let attested_credential = if flags.attested_credential_data() {
        let aaguid: [u8; 16] = reader.take_array()?;
        let len = u16::from_be_bytes(reader.take_array()?) as usize;
        if len > MAX_CREDENTIAL_ID_LEN {
            return Err(DecodeError::CredentialIdTooLong(len));
        }
        let credential_id = reader.take(len)?.to_vec();

        let (key, used) = cbor_prefix(reader.rest())?;
        reader.advance(used)?;
        let public_key = cose_key_from_value(key)?;

        Some(AttestedCredentialData {
            aaguid,
            credential_id,
            public_key,
        })
    } else {
        None
    };

    let extensions = if flags.extension_data() {
        let (ext, used) = cbor_prefix(reader.rest())?;
        reader.advance(used)?;
        // Only checked for shape; no extension is acted upon.
        cbor_map(ext.clone(), "extensions", MAX_EXTENSION_ENTRIES)?;
        Some(ext)
    } else {
        None
    };

    if reader.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }

    Ok(AuthenticatorData {
        raw: bytes.to_vec(),
        rp_id_hash,
        flags,
        sign_count,
        attested_credential,
        extensions,
    })
}
