//! # Application State
//!
//! Shared state handed to every request handler. Axum clones it per request,
//! which is cheap: everything inside is behind an `Arc` or is a pool handle.

use crate::config::Config;
use crate::db::SqliteCredentialStore;
use crate::session::MemorySessionStore;
use crate::webauthn::RelyingParty;
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Ceremony engine plus its stores
    pub relying_party: RelyingParty,
}

impl AppState {
    /// Initialize application state
    ///
    /// 1. Connects to the SQLite database and migrates the credential table
    /// 2. Keeps pending ceremonies in memory; they only live for minutes
    /// 3. Builds the relying party from the validated configuration
    ///
    /// Returns the state and the pool, which the HTTP session store shares.
    pub async fn new(config: &Config) -> Result<(Self, SqlitePool)> {
        let db = SqlitePool::connect(&config.database_url).await?;
        let credentials = SqliteCredentialStore::new(db.clone()).await?;

        let relying_party = RelyingParty::new(
            Arc::new(config.rp.clone()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(credentials),
        );

        Ok((AppState { relying_party }, db))
    }

    pub fn from_relying_party(relying_party: RelyingParty) -> Self {
        Self { relying_party }
    }
}
