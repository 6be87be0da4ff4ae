//! The four transport-independent operations the HTTP layer exposes.
//!
//! `RelyingParty` wires the ceremonies to the credential store: it saves what
//! registration emits, looks up what authentication needs and persists the new
//! counter with a compare-and-swap.

use crate::config::RpConfig;
use crate::db::{CredentialRecord, CredentialStore};
use crate::error::{AppResult, AuthError};
use crate::session::{ChallengeManager, SessionStore};
use crate::webauthn::attestation::AttestationVerifier;
use crate::webauthn::authentication::AuthenticationCeremony;
use crate::webauthn::registration::RegistrationCeremony;
use crate::webauthn::types::*;
use std::sync::Arc;

#[derive(Clone)]
pub struct RelyingParty {
    config: Arc<RpConfig>,
    challenges: ChallengeManager,
    registration: RegistrationCeremony,
    authentication: AuthenticationCeremony,
    credentials: Arc<dyn CredentialStore>,
}

impl RelyingParty {
    pub fn new(
        config: Arc<RpConfig>,
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        // Both ceremonies share one challenge manager (and so one store)
        let challenges = ChallengeManager::new(sessions, config.clone());
        Self {
            registration: RegistrationCeremony::new(config.clone(), challenges.clone()),
            authentication: AuthenticationCeremony::new(config.clone(), challenges.clone()),
            challenges,
            config,
            credentials,
        }
    }

    /// Swap the attestation statement check used by registration.
    pub fn with_attestation_verifier(mut self, verifier: Arc<dyn AttestationVerifier>) -> Self {
        self.registration = self.registration.with_attestation_verifier(verifier);
        self
    }

    pub fn config(&self) -> &RpConfig {
        &self.config
    }

    pub fn challenges(&self) -> &ChallengeManager {
        &self.challenges
    }

    /// `GetRegistrationOptions`
    pub async fn registration_options(&self, token: &str) -> RegistrationOptions {
        self.registration.create_options(token).await
    }

    /// `VerifyRegistration`: verify and store the new credential.
    pub async fn verify_registration(
        &self,
        token: &str,
        credential: &RegistrationCredential,
    ) -> AppResult<CredentialRecord> {
        // Verify first; nothing is stored for a rejected response
        let record = self
            .registration
            .verify(token, credential)
            .await
            .inspect_err(|e| tracing::warn!(token, error = %e, "registration rejected"))?;

        // Persist; a duplicate credential id surfaces as StoreError::Duplicate
        self.credentials.save(&record).await?;
        Ok(record)
    }

    /// `GetAssertionOptions`. `allow` is the credential bound to the caller's
    /// session, if any.
    pub async fn assertion_options(&self, token: &str, allow: &[Vec<u8>]) -> AssertionOptions {
        self.authentication.create_options(token, allow).await
    }

    /// `VerifyAssertion`: verify against the stored credential and move its
    /// counter forward.
    ///
    /// `bound` restricts the assertion to one credential id (the one the
    /// session registered); any other id is reported as unknown.
    pub async fn verify_assertion(
        &self,
        token: &str,
        credential: &AssertionCredential,
        bound: Option<&[u8]>,
    ) -> AppResult<AuthResult> {
        // Look up the credential, unless the session is bound to another one
        let raw_id = credential.raw_id.as_slice();
        let stored = match bound {
            Some(id) if id != raw_id => None,
            _ => self.credentials.find_by_credential_id(raw_id).await?,
        };

        let result = self
            .authentication
            .verify(token, credential, stored.as_ref())
            .await
            .inspect_err(|e| tracing::warn!(token, error = %e, "assertion rejected"))?;

        // `verify` only succeeds with a stored record.
        let Some(stored) = stored else {
            return Err(AuthError::UnknownCredential.into());
        };
        // Persist the new counter only if nobody moved it since the lookup
        let updated = self
            .credentials
            .update_counter(raw_id, stored.sign_count, result.sign_count)
            .await?;
        if !updated {
            // Another login with this credential got there first.
            tracing::warn!(token, credential_id = %stored.id_b64(), "counter update lost");
            return Err(AuthError::ReplayDetected {
                stored: stored.sign_count,
                presented: result.sign_count,
            }
            .into());
        }

        Ok(result)
    }
}
