//! # Passkey Registration Logic
//!
//! Registration is a two-step process: options and verification.
//!
//! ## Registration Flow
//! 1. **Options**: issue a challenge + user handle → send creation options
//! 2. **Verify**: check the attestation response → emit a `CredentialRecord`
//!
//! The caller stores the record; nothing here persists anything.

use crate::codec::{
    base64url_encode, decode_attestation_object, decode_client_data, AttestationObject,
    ClientData, ClientDataType,
};
use crate::config::{RpConfig, UserVerification};
use crate::db::CredentialRecord;
use crate::error::RegistrationError;
use crate::session::{CeremonyKind, ChallengeManager};
use crate::webauthn::attestation::{AttestationVerifier, StructuralAttestation};
use crate::webauthn::types::*;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Registration ceremony for one relying party.
#[derive(Clone)]
pub struct RegistrationCeremony {
    config: Arc<RpConfig>,
    challenges: ChallengeManager,
    attestation: Arc<dyn AttestationVerifier>,
}

impl RegistrationCeremony {
    pub fn new(config: Arc<RpConfig>, challenges: ChallengeManager) -> Self {
        Self {
            config,
            challenges,
            attestation: Arc::new(StructuralAttestation),
        }
    }

    /// Replace the attestation statement check.
    pub fn with_attestation_verifier(mut self, verifier: Arc<dyn AttestationVerifier>) -> Self {
        self.attestation = verifier;
        self
    }

    /// Start a registration: issue a challenge for `token` and build the
    /// options for `navigator.credentials.create()`.
    pub async fn create_options(&self, token: &str) -> RegistrationOptions {
        let issued = self
            .challenges
            .issue_challenge(token, CeremonyKind::Registration)
            .await;

        // No account system: the user is named after its random handle.
        let name = base64url_encode(&issued.user_handle);

        RegistrationOptions {
            challenge: issued.challenge.into(),
            rp: RelyingPartyEntity {
                id: self.config.rp_id.clone(),
                name: self.config.rp_name.clone(),
            },
            user: UserEntity {
                id: issued.user_handle.into(),
                display_name: name.clone(),
                name,
            },
            pub_key_cred_params: self
                .config
                .algorithms
                .iter()
                .map(|alg| PubKeyCredParam {
                    type_: "public-key",
                    alg: alg.id(),
                })
                .collect(),
            timeout: self.config.timeout_ms,
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: "cross-platform",
                resident_key: "discouraged",
                require_resident_key: false,
                user_verification: self.config.user_verification,
            },
            attestation: "direct",
        }
    }

    /// Verify an attestation response for `token`.
    ///
    /// Checks, in order: client data type, challenge, origin, attestation
    /// object structure, rpIdHash, user presence/verification, attested
    /// credential data, algorithm policy, attestation statement. The first
    /// failing check decides the error.
    pub async fn verify(
        &self,
        token: &str,
        credential: &RegistrationCredential,
    ) -> Result<CredentialRecord, RegistrationError> {
        // 1. Client data; a response rejected here still spends the challenge
        let client_data = match check_client_data(credential) {
            Ok(client_data) => client_data,
            Err(e) => {
                self.challenges.abandon(token).await;
                return Err(e);
            }
        };

        // 2. Challenge (removed from the store under SingleAttempt)
        let session = self
            .challenges
            .consume_challenge(token, CeremonyKind::Registration, &client_data.challenge)
            .await?;

        // 3. Origin: exact match, and never from a cross-origin iframe
        if client_data.origin != self.config.origin || client_data.cross_origin {
            return Err(RegistrationError::OriginMismatch(client_data.origin));
        }

        // 4. Attestation object (CBOR), including authenticatorData and the key
        let attestation = decode_attestation_object(
            credential.response.attestation_object.as_slice(),
        )?;
        let auth_data = &attestation.auth_data;

        // 5. rpIdHash: the authenticator scoped the credential to our RP id
        let rp_id_hash: [u8; 32] = Sha256::digest(self.config.rp_id.as_bytes()).into();
        if auth_data.rp_id_hash != rp_id_hash {
            return Err(RegistrationError::RpIdMismatch);
        }

        // 6. User presence / verification
        // UP is required whatever the policy; UV only when configured
        if !auth_data.flags.user_present() {
            return Err(RegistrationError::UserNotVerified);
        }
        if self.config.user_verification == UserVerification::Required
            && !auth_data.flags.user_verified()
        {
            return Err(RegistrationError::UserNotVerified);
        }

        // 7. Credential: AT flag with a key in an allowed algorithm
        let attested = auth_data
            .attested_credential
            .as_ref()
            .ok_or(RegistrationError::NoCredentialData)?;
        if !self.config.algorithms.contains(&attested.public_key.algorithm) {
            return Err(RegistrationError::AlgorithmNotAllowed(
                attested.public_key.algorithm.id(),
            ));
        }

        // 8. Attestation statement, over the exact clientDataJSON bytes received
        let client_data_hash: [u8; 32] = Sha256::digest(credential.response.client_data_json.as_slice()).into();
        self.attestation
            .verify(&attestation, &attested.public_key, &client_data_hash)?;

        // 9. Spend the challenge (first success wins under RetryUntilExpiry)
        self.challenges.complete(token, &session).await?;

        // Build the record with the user handle issued alongside the challenge
        let record = build_record(&attestation, session.user_handle)?;
        tracing::info!(
            token,
            credential_id = %record.id_b64(),
            format = %attestation.format,
            "credential registered"
        );
        Ok(record)
    }
}

fn build_record(
    attestation: &AttestationObject,
    user_handle: Vec<u8>,
) -> Result<CredentialRecord, RegistrationError> {
    let auth_data = &attestation.auth_data;
    let attested = auth_data
        .attested_credential
        .as_ref()
        .ok_or(RegistrationError::NoCredentialData)?;

    // Initial counter is whatever the authenticator reported (often 0)
    Ok(CredentialRecord {
        credential_id: attested.credential_id.clone(),
        public_key: attested.public_key.clone(),
        sign_count: auth_data.sign_count,
        user_handle,
        aaguid: attested.aaguid,
        attestation_format: attestation.format.clone(),
        created_at: Utc::now(),
    })
}

/// Credential type and collected client data of a registration response.
fn check_client_data(credential: &RegistrationCredential) -> Result<ClientData, RegistrationError> {
    // PublicKeyCredential.type is always "public-key"
    if credential.type_ != "public-key" {
        return Err(RegistrationError::BadClientData(format!(
            "credential type `{}`",
            credential.type_
        )));
    }

    // Parse clientDataJSON, then make sure it was produced by create()
    let client_data = decode_client_data(credential.response.client_data_json.as_slice())
        .map_err(|e| RegistrationError::BadClientData(e.to_string()))?;
    if client_data.type_ != ClientDataType::Create {
        return Err(RegistrationError::BadClientData(
            "type is not webauthn.create".to_string(),
        ));
    }
    Ok(client_data)
}
