//! # Ceremony Handlers
//!
//! The four WebAuthn endpoints. The HTTP session (cookie) carries:
//! - `ceremony_token`: the opaque token pending challenges are keyed by
//! - `credential_id`: the credential registered in this session, base64url
//!
//! Every failure answers `{"status": "failed"}`; see `AppError`.

use crate::codec::{base64url_decode, base64url_encode};
use crate::error::{AppError, AppResult, ChallengeError, AuthError, RegistrationError};
use crate::state::AppState;
use crate::webauthn::types::*;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use tower_sessions::Session;
use uuid::Uuid;

const TOKEN_KEY: &str = "ceremony_token";
const CREDENTIAL_KEY: &str = "credential_id";

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Session(e.to_string())
}

/// Token of this session, created on first use.
async fn ceremony_token(session: &Session) -> AppResult<String> {
    if let Some(token) = session.get::<String>(TOKEN_KEY).await.map_err(session_error)? {
        return Ok(token);
    }
    let token = Uuid::new_v4().to_string();
    session
        .insert(TOKEN_KEY, &token)
        .await
        .map_err(session_error)?;
    Ok(token)
}

async fn existing_token(session: &Session) -> AppResult<Option<String>> {
    session.get::<String>(TOKEN_KEY).await.map_err(session_error)
}

/// Credential registered earlier in this session, if any.
async fn bound_credential(session: &Session) -> AppResult<Option<Vec<u8>>> {
    let id: Option<String> = session.get(CREDENTIAL_KEY).await.map_err(session_error)?;
    Ok(id.and_then(|id| base64url_decode(&id, CREDENTIAL_KEY).ok()))
}

// Registration endpoints

/// GET /wa/register-options
pub async fn register_options(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<RegistrationOptions>> {
    let token = ceremony_token(&session).await?;
    let options = state.relying_party.registration_options(&token).await;
    Ok(Json(options))
}

/// POST /wa/register
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<CredentialEnvelope<RegistrationCredential>>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let token = existing_token(&session)
        .await?
        .ok_or(RegistrationError::ChallengeInvalid(ChallengeError::NotFound))?;

    let record = state
        .relying_party
        .verify_registration(&token, &body.credential)
        .await?;

    session
        .insert(CREDENTIAL_KEY, base64url_encode(&record.credential_id))
        .await
        .map_err(session_error)?;

    Ok(Json(json!({ "status": "ok" })))
}

// Authentication endpoints

/// GET /wa/authenticate-options
pub async fn authenticate_options(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<AssertionOptions>> {
    let token = ceremony_token(&session).await?;
    let allow: Vec<Vec<u8>> = bound_credential(&session).await?.into_iter().collect();
    let options = state
        .relying_party
        .assertion_options(&token, &allow)
        .await;
    Ok(Json(options))
}

/// POST /wa/authenticate
pub async fn authenticate(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<CredentialEnvelope<AssertionCredential>>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let token = existing_token(&session)
        .await?
        .ok_or(AuthError::ChallengeInvalid(ChallengeError::NotFound))?;
    let bound = bound_credential(&session).await?;

    state
        .relying_party
        .verify_assertion(&token, &body.credential, bound.as_deref())
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}
