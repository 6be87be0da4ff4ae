//! # WebAuthn Module
//!
//! The ceremony protocol and verification engine.
//!
//! ## Submodules
//! - `types`: Request/response types for the API
//! - `registration`: Creating new credentials (attestation)
//! - `authentication`: Logging in with existing credentials (assertion)
//! - `verifier`: Signature verification shared by both ceremonies
//! - `attestation`: Pluggable attestation statement checks
//! - `relying_party`: The four operations the transport layer calls
//!
//! ## WebAuthn Flow Overview
//!
//! ### Registration (Creating a Passkey)
//! 1. Client requests options → `RelyingParty::registration_options()`
//! 2. Client uses WebAuthn API to create credential with authenticator
//! 3. Client sends credential back → `RelyingParty::verify_registration()`
//! 4. Server verifies the attestation and stores the public key
//!
//! ### Authentication (Logging In)
//! 1. Client requests options → `RelyingParty::assertion_options()`
//! 2. Client uses WebAuthn API to sign challenge with authenticator
//! 3. Client sends signed assertion back → `RelyingParty::verify_assertion()`
//! 4. Server verifies signature and counter, then stores the new counter
//!
//! ## Ceremony States
//! A session token with nothing pending is awaiting options; a pending
//! challenge in the session store means options were issued; `verify()` runs
//! the checks and ends in a credential/auth result or a rejection.

pub mod attestation;
pub mod authentication;
pub mod registration;
pub mod relying_party;
pub mod types;
pub mod verifier;

pub use relying_party::RelyingParty;
