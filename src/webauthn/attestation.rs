//! # Attestation Statements
//!
//! Where the authenticator's proof of origin would be checked. Trust-chain
//! validation against vendor roots is not done here; the seam is the
//! `AttestationVerifier` trait so a deployment that needs it can plug in a
//! per-format implementation.
//!
//! `StructuralAttestation`, the default:
//! - `none`: the statement must be empty
//! - `packed` without `x5c` (self attestation): `sig` must verify with the
//!   credential key over `authData || SHA-256(clientDataJSON)`, and `alg` must
//!   be the credential's algorithm
//! - anything else: accepted as long as it decoded

use crate::codec::{AttestationFormat, AttestationObject, CoseAlgorithm, CoseKey};
use crate::error::RegistrationError;
use crate::webauthn::verifier::verify_signature;
use ciborium::value::Value;

/// Checks the attestation statement of a registration response.
pub trait AttestationVerifier: Send + Sync {
    fn verify(
        &self,
        attestation: &AttestationObject,
        credential_key: &CoseKey,
        client_data_hash: &[u8; 32],
    ) -> Result<(), RegistrationError>;
}

/// Format checks without trust anchors. See the module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralAttestation;

impl AttestationVerifier for StructuralAttestation {
    fn verify(
        &self,
        attestation: &AttestationObject,
        credential_key: &CoseKey,
        client_data_hash: &[u8; 32],
    ) -> Result<(), RegistrationError> {
        match attestation.format {
            // `none`: nothing to check, but nothing may be claimed either
            AttestationFormat::None => {
                if !attestation.statement.is_empty() {
                    return Err(invalid("`none` attestation with a non-empty statement"));
                }
                Ok(())
            }
            // `packed` without a certificate chain is self attestation
            AttestationFormat::Packed if attestation.statement_entry("x5c").is_none() => {
                verify_packed_self(attestation, credential_key, client_data_hash)
            }
            // Certificate-based formats: no trust anchors configured
            _ => {
                tracing::debug!(
                    format = %attestation.format,
                    "attestation statement accepted without trust verification"
                );
                Ok(())
            }
        }
    }
}

fn verify_packed_self(
    attestation: &AttestationObject,
    credential_key: &CoseKey,
    client_data_hash: &[u8; 32],
) -> Result<(), RegistrationError> {
    // Step 1: `alg` must name a supported algorithm
    let alg = match attestation.statement_entry("alg") {
        Some(Value::Integer(i)) => i64::try_from(i128::from(*i))
            .ok()
            .and_then(|id| CoseAlgorithm::try_from(id).ok())
            .ok_or_else(|| invalid("unsupported `alg` in packed statement"))?,
        _ => return Err(invalid("packed statement without `alg`")),
    };
    // Step 2: self attestation signs with the credential key itself
    if alg != credential_key.algorithm {
        return Err(invalid("self attestation `alg` differs from the credential key"));
    }

    // Step 3: extract the signature
    let sig = match attestation.statement_entry("sig") {
        Some(Value::Bytes(sig)) => sig,
        _ => return Err(invalid("packed statement without `sig`")),
    };

    // Step 4: verify over authData || SHA-256(clientDataJSON)
    let mut signed = attestation.auth_data.raw.clone();
    signed.extend_from_slice(client_data_hash);
    if !verify_signature(credential_key, alg, &signed, sig) {
        return Err(invalid("self attestation signature does not verify"));
    }
    Ok(())
}

fn invalid(reason: &str) -> RegistrationError {
    RegistrationError::AttestationInvalid(reason.to_string())
}
