//! # Credential Database Operations
//!
//! SQLite implementation of `CredentialStore`.
//!
//! ## Signature Counter
//! `update_counter` only writes when the row still holds the counter the
//! caller verified against. Two concurrent logins with the same credential
//! cannot both move the counter from the same starting value.

use super::models::{CredentialRecord, CredentialRow};
use super::CredentialStore;
use crate::codec::base64url_encode;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Credential store backed by a SQLite pool.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Wrap an existing pool and bring the schema up to date.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        // Apply pending migrations from ./migrations (embedded at compile time)
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests.
    ///
    /// Every connection to `sqlite::memory:` opens its own database, so the
    /// pool is capped at one connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<CredentialRecord>, StoreError> {
        // Look up by the base64url form of the id (the primary key)
        let row = sqlx::query_as::<_, CredentialRow>("SELECT * FROM credentials WHERE id = ?")
            .bind(base64url_encode(credential_id))
            .fetch_optional(&self.pool)  // Returns None if not found
            .await?;

        // Option<Result<_>> -> Result<Option<_>>
        row.map(|r| r.into_record(credential_id)).transpose()
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        // Store the key as COSE_Key bytes, the same form the authenticator sent
        let public_key = record.public_key.to_cbor()?;

        // Insert credential into database
        sqlx::query(
            "INSERT INTO credentials
             (id, user_handle, public_key, sign_count, aaguid, attestation_format, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id_b64())                        // base64url text primary key
        .bind(&record.user_handle)                    // Byte array stored as BLOB
        .bind(public_key)                             // COSE_Key stored as BLOB
        .bind(i64::from(record.sign_count))           // Convert u32 to i64 for SQLite
        .bind(record.aaguid.to_vec())
        .bind(record.attestation_format.to_string())
        .bind(record.created_at.to_rfc3339())         // RFC3339 timestamp
        .execute(&self.pool)
        .await
        // The primary key rejects a second registration of the same id
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
            other => StoreError::Database(other),
        })?;

        Ok(())
    }

    async fn update_counter(
        &self,
        credential_id: &[u8],
        expected: u32,
        new_count: u32,
    ) -> Result<bool, StoreError> {
        // Compare-and-swap: only the row still at `expected` is updated
        let result = sqlx::query(
            "UPDATE credentials
             SET sign_count = ?, last_used_at = ?
             WHERE id = ? AND sign_count = ?",
        )
        .bind(i64::from(new_count))              // Convert u32 to i64 for SQLite
        .bind(Utc::now().to_rfc3339())           // Record when it was last used
        .bind(base64url_encode(credential_id))
        .bind(i64::from(expected))               // Counter the caller verified against
        .execute(&self.pool)
        .await?;

        // Zero rows: another login moved the counter, or the credential is gone
        Ok(result.rows_affected() == 1)
    }
}
