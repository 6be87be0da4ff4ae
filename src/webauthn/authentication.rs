//! # Passkey Authentication Logic
//!
//! ## Authentication Flow
//! 1. **Options**: issue a fresh challenge → send request options
//! 2. **Verify**: check the assertion against the stored credential
//! 3. The caller persists the new signature counter from `AuthResult`
//!
//! ## Signature Counter
//! A cloned authenticator shows up as a counter that did not move forward.
//! Authenticators without a counter report 0 forever; 0 after a stored 0 is
//! accepted.

use crate::codec::{decode_authenticator_data, decode_client_data, ClientData, ClientDataType};
use crate::config::{RpConfig, UserVerification};
use crate::db::CredentialRecord;
use crate::error::AuthError;
use crate::session::{CeremonyKind, ChallengeManager};
use crate::webauthn::types::*;
use crate::webauthn::verifier::verify_signature;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Authentication ceremony for one relying party.
#[derive(Clone)]
pub struct AuthenticationCeremony {
    config: Arc<RpConfig>,
    challenges: ChallengeManager,
}

impl AuthenticationCeremony {
    pub fn new(config: Arc<RpConfig>, challenges: ChallengeManager) -> Self {
        Self { config, challenges }
    }

    /// Start an authentication: issue a challenge for `token` and build the
    /// options for `navigator.credentials.get()`.
    ///
    /// `allow` lists credential ids the browser may use; empty leaves the
    /// choice to the browser.
    pub async fn create_options(&self, token: &str, allow: &[Vec<u8>]) -> AssertionOptions {
        let issued = self
            .challenges
            .issue_challenge(token, CeremonyKind::Authentication)
            .await;

        AssertionOptions {
            challenge: issued.challenge.into(),
            timeout: self.config.timeout_ms,
            rp_id: self.config.rp_id.clone(),
            user_verification: self.config.user_verification,
            allow_credentials: allow
                .iter()
                .map(|id| AllowCredential {
                    type_: "public-key",
                    id: id.clone().into(),
                })
                .collect(),
        }
    }

    /// Verify an assertion for `token` against `stored`, the record the caller
    /// looked up by `credential.rawId` (`None` if there was none).
    pub async fn verify(
        &self,
        token: &str,
        credential: &AssertionCredential,
        stored: Option<&CredentialRecord>,
    ) -> Result<AuthResult, AuthError> {
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
            .consume_challenge(token, CeremonyKind::Authentication, &client_data.challenge)
            .await?;

        // 3. Origin: exact match, and never from a cross-origin iframe
        if client_data.origin != self.config.origin || client_data.cross_origin {
            return Err(AuthError::OriginMismatch(client_data.origin));
        }

        // 4. Authenticator data: no attested credential expected here
        let auth_data =
            decode_authenticator_data(credential.response.authenticator_data.as_slice())?;

        // rpIdHash, then UP always and UV when required
        let rp_id_hash: [u8; 32] = Sha256::digest(self.config.rp_id.as_bytes()).into();
        if auth_data.rp_id_hash != rp_id_hash {
            return Err(AuthError::RpIdMismatch);
        }
        if !auth_data.flags.user_present() {
            return Err(AuthError::UserNotVerified);
        }
        if self.config.user_verification == UserVerification::Required
            && !auth_data.flags.user_verified()
        {
            return Err(AuthError::UserNotVerified);
        }

        // 5. Stored credential, looked up by rawId
        let stored = stored.ok_or(AuthError::UnknownCredential)?;
        if stored.credential_id != credential.raw_id.as_slice() {
            return Err(AuthError::UnknownCredential);
        }
        // userHandle is optional; when present it must be the registered one
        if let Some(handle) = &credential.response.user_handle {
            if handle.as_slice() != stored.user_handle.as_slice() {
                return Err(AuthError::UnknownCredential);
            }
        }

        // 6. Counter
        check_counter(stored.sign_count, auth_data.sign_count)?;

        // 7. Signature over authenticatorData || SHA-256(clientDataJSON)
        let mut signed = auth_data.raw.clone();
        signed.extend_from_slice(&Sha256::digest(credential.response.client_data_json.as_slice()));
        if !verify_signature(
            &stored.public_key,
            stored.public_key.algorithm,
            &signed,
            credential.response.signature.as_slice(),
        ) {
            return Err(AuthError::SignatureInvalid);
        }

        // 8. Spend the challenge (first success wins under RetryUntilExpiry)
        self.challenges.complete(token, &session).await?;

        tracing::info!(
            token,
            credential_id = %stored.id_b64(),
            sign_count = auth_data.sign_count,
            "assertion verified"
        );
        Ok(AuthResult {
            credential_id: stored.credential_id.clone(),
            user_handle: stored.user_handle.clone(),
            sign_count: auth_data.sign_count,
            user_verified: auth_data.flags.user_verified(),
        })
    }
}

/// Reject a counter that did not strictly increase, except the 0 → 0 case of
/// authenticators that do not implement one.
pub fn check_counter(stored: u32, presented: u32) -> Result<(), AuthError> {
    // Counterless authenticator: always reports 0
    if stored == 0 && presented == 0 {
        return Ok(());
    }
    // Equal or lower: a clone, or a replayed assertion
    if presented <= stored {
        return Err(AuthError::ReplayDetected { stored, presented });
    }
    Ok(())
}

/// Credential type and collected client data of an assertion response.
fn check_client_data(credential: &AssertionCredential) -> Result<ClientData, AuthError> {
    // PublicKeyCredential.type is always "public-key"
    if credential.type_ != "public-key" {
        return Err(AuthError::BadClientData(format!(
            "credential type `{}`",
            credential.type_
        )));
    }

    // Parse clientDataJSON, then make sure it was produced by get()
    let client_data = decode_client_data(credential.response.client_data_json.as_slice())
        .map_err(|e| AuthError::BadClientData(e.to_string()))?;
    if client_data.type_ != ClientDataType::Get {
        return Err(AuthError::BadClientData("type is not webauthn.get".to_string()));
    }
    Ok(client_data)
}
