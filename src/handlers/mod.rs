//! # HTTP Request Handlers
//!
//! Thin transport layer over `RelyingParty`.
//!
//! ## Submodules
//! - `health`: Health check endpoint (for monitoring)
//! - `auth`: The registration and authentication ceremony endpoints
//!
//! ## Handler Pattern
//! Handlers are async functions that:
//! 1. Extract data from request (JSON body, session)
//! 2. Call the relying party
//! 3. Return a response (JSON, status code)
//!
//! The ceremony handlers extract `tower_sessions::Session`, so the router
//! returned by [`routes`] must be wrapped in a `SessionManagerLayer`.

pub mod auth;
pub mod health;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// All API routes, with state attached.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Registration flow (creating a new passkey)
        .route("/wa/register-options", get(auth::register_options))
        .route("/wa/register", post(auth::register))
        // Authentication flow (logging in with a passkey)
        .route("/wa/authenticate-options", get(auth::authenticate_options))
        .route("/wa/authenticate", post(auth::authenticate))
        .with_state(state)
}
