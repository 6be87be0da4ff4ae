//! # Passkey Relying Party
//!
//! A WebAuthn relying party: issues ceremony challenges, verifies attestation
//! and assertion responses, and keeps registered credentials with their
//! signature counters.
//!
//! ## Modules
//! - `codec`: authenticatorData, attestation object, COSE key, clientDataJSON
//! - `session`: pending ceremony challenges
//! - `webauthn`: the ceremonies and the `RelyingParty` service
//! - `db`: credential stores (SQLite and in-memory)
//! - `handlers`: the HTTP endpoints

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod session;
pub mod state;
pub mod webauthn;

pub use config::{ChallengePolicy, Config, RpConfig, UserVerification};
pub use error::{AppError, AuthError, ChallengeError, DecodeError, RegistrationError, StoreError};
pub use webauthn::RelyingParty;
