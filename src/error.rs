//! # Error Handling
//!
//! This module defines the error types for every layer of the relying party and
//! converts the transport-level error into an HTTP response.
//!
//! ## Layers
//! - `DecodeError`: attacker-supplied bytes or JSON did not parse. Always fatal.
//! - `ChallengeError`: no usable pending challenge for the session.
//! - `RegistrationError` / `AuthError`: one specific ceremony check failed.
//! - `StoreError`: the credential store collaborator failed.
//! - `AppError`: what the HTTP handlers return.
//!
//! ## Leaking nothing
//! The client only ever sees `{"status": "failed"}`. The specific reason is
//! written to the log so operators can still tell an origin mismatch from a
//! replayed counter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Structural decoding failure of a wire structure.
///
/// A decode error never carries a partially populated value: the codec either
/// returns a complete structure or one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after structure")]
    TrailingBytes(usize),

    #[error("invalid CBOR: {0}")]
    Cbor(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("duplicate field `{0}`")]
    DuplicateField(String),

    #[error("`{field}` has more than {max} entries")]
    TooManyEntries { field: &'static str, max: usize },

    #[error("field `{0}` has an unexpected type")]
    UnexpectedType(&'static str),

    #[error("unsupported COSE algorithm {0}")]
    UnsupportedAlgorithm(i64),

    #[error("invalid public key: {0}")]
    InvalidKey(&'static str),

    #[error("credential id of {0} bytes exceeds the 1023 byte limit")]
    CredentialIdTooLong(usize),

    #[error("invalid client data JSON: {0}")]
    Json(String),

    #[error("invalid base64url in `{0}`")]
    Base64(&'static str),
}

/// Failure to find or match a pending ceremony challenge.
///
/// Any of these means the client has to start the ceremony over.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("no pending challenge for this session")]
    NotFound,

    #[error("pending challenge has expired")]
    Expired,

    #[error("presented challenge does not match the issued one")]
    Mismatch,
}

/// Reasons a registration (attestation) response is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("bad client data: {0}")]
    BadClientData(String),

    #[error("challenge invalid: {0}")]
    ChallengeInvalid(#[from] ChallengeError),

    #[error("origin `{0}` does not match the relying party origin")]
    OriginMismatch(String),

    #[error("rpIdHash does not match the relying party id")]
    RpIdMismatch,

    #[error("required user presence or verification flag not set")]
    UserNotVerified,

    #[error("authenticator data carries no attested credential")]
    NoCredentialData,

    #[error("credential algorithm {0} is not allowed")]
    AlgorithmNotAllowed(i64),

    #[error("attestation statement invalid: {0}")]
    AttestationInvalid(String),

    #[error("malformed attestation: {0}")]
    Malformed(#[from] DecodeError),
}

/// Reasons an authentication (assertion) response is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("bad client data: {0}")]
    BadClientData(String),

    #[error("challenge invalid: {0}")]
    ChallengeInvalid(#[from] ChallengeError),

    #[error("origin `{0}` does not match the relying party origin")]
    OriginMismatch(String),

    #[error("rpIdHash does not match the relying party id")]
    RpIdMismatch,

    #[error("required user presence or verification flag not set")]
    UserNotVerified,

    #[error("malformed assertion: {0}")]
    Malformed(#[from] DecodeError),

    #[error("unknown credential")]
    UnknownCredential,

    #[error("signature counter did not increase (stored {stored}, presented {presented})")]
    ReplayDetected { stored: u32, presented: u32 },

    #[error("signature verification failed")]
    SignatureInvalid,
}

/// Credential store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("credential already registered")]
    Duplicate,

    #[error("stored credential is corrupt: {0}")]
    Corrupt(#[from] DecodeError),
}

/// Invalid relying-party configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("challenge length must be at least 16 bytes, got {0}")]
    ChallengeTooShort(usize),

    #[error("at least one public key algorithm must be allowed")]
    NoAlgorithms,

    #[error("ceremony TTL must be a positive number of seconds, got {0}")]
    InvalidCeremonyTtl(i64),

    #[error("unknown public key algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("unknown user verification requirement `{0}`")]
    UnknownUserVerification(String),

    #[error("unknown challenge policy `{0}`")]
    UnknownChallengePolicy(String),

    #[error("invalid origin `{0}`: {1}")]
    InvalidOrigin(String, &'static str),

    #[error("origin host `{host}` is not within relying party id `{rp_id}`")]
    RpIdNotInOrigin { host: String, rp_id: String },
}

/// Application-wide error type returned by the HTTP handlers.
///
/// ## The `#[from]` attribute
/// Every lower-level error converts into `AppError` with `?`, so the relying
/// party service and the handlers never map errors by hand.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("registration rejected: {0}")]
    Registration(#[from] RegistrationError),

    #[error("authentication rejected: {0}")]
    Authentication(#[from] AuthError),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Convert AppError into an HTTP response
///
/// 1. Log the specific error kind (ceremony rejections were already logged
///    with their session token, so they only repeat at debug)
/// 2. Pick the status code: ceremony rejections are the client's fault,
///    store and session failures are ours
/// 3. Return the same generic body for all of them
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Registration(e) => {
                tracing::debug!(error = %e, "registration rejected");
                StatusCode::BAD_REQUEST
            }
            AppError::Authentication(e) => {
                tracing::debug!(error = %e, "authentication rejected");
                StatusCode::BAD_REQUEST
            }
            AppError::Store(e) => {
                tracing::error!(error = ?e, "credential store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Session(e) => {
                tracing::error!(error = %e, "session failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadRequest(e) => {
                tracing::warn!(error = %e, "malformed request");
                StatusCode::BAD_REQUEST
            }
        };

        (status, Json(json!({ "status": "failed" }))).into_response()
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
