//! # Database Models
//!
//! `CredentialRecord` is what the relying party knows about a registered
//! credential. `CredentialRow` is its SQLite shape.
//!
//! ## Security Note
//! Only public keys are stored. The private key never leaves the authenticator.

use crate::codec::{base64url_encode, decode_cose_key, AttestationFormat, CoseKey};
use crate::error::StoreError;
use chrono::{DateTime, Utc};

/// A registered credential.
///
/// Created by a successful registration; only `sign_count` changes afterwards,
/// and it never goes down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Authenticator-chosen credential id
    pub credential_id: Vec<u8>,

    /// Public key and the algorithm it signs with
    pub public_key: CoseKey,

    /// Last signature counter accepted for this credential
    pub sign_count: u32,

    /// User handle issued with the registration challenge
    pub user_handle: Vec<u8>,

    /// Authenticator model identifier (all zeros for many authenticators)
    pub aaguid: [u8; 16],

    /// Attestation format the authenticator used at registration
    pub attestation_format: AttestationFormat,

    pub created_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Credential id as base64url, the form used in logs and in the database.
    pub fn id_b64(&self) -> String {
        base64url_encode(&self.credential_id)
    }
}

/// Row of the `credentials` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    /// Credential id, base64url encoded
    pub id: String,
    pub user_handle: Vec<u8>,
    /// COSE_Key bytes
    pub public_key: Vec<u8>,
    /// SQLite has no unsigned integers; the counter is stored as i64
    pub sign_count: i64,
    pub aaguid: Vec<u8>,
    pub attestation_format: String,
    /// RFC3339 timestamp
    pub created_at: String,
    pub last_used_at: Option<String>,
}

impl CredentialRow {
    /// Rebuild the record, re-validating the stored key on the way out.
    pub fn into_record(self, credential_id: &[u8]) -> Result<CredentialRecord, StoreError> {
        // Re-parse the COSE_Key so a corrupted row never reaches verification
        let public_key = decode_cose_key(&self.public_key)?;

        // Convert i64 back to u32; a negative or huge value means a bad row
        let sign_count = u32::try_from(self.sign_count).map_err(|_| {
            StoreError::Database(sqlx::Error::Decode("sign_count out of range".into()))
        })?;
        let aaguid: [u8; 16] = self.aaguid.as_slice().try_into().map_err(|_| {
            StoreError::Database(sqlx::Error::Decode("aaguid must be 16 bytes".into()))
        })?;
        // Parse RFC3339 timestamp back to DateTime<Utc>
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?
            .with_timezone(&Utc);

        Ok(CredentialRecord {
            credential_id: credential_id.to_vec(),
            public_key,
            sign_count,
            user_handle: self.user_handle,
            aaguid,
            attestation_format: AttestationFormat::from(self.attestation_format.as_str()),
            created_at,
        })
    }
}
