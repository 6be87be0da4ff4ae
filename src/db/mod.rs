//! # Credential Store
//!
//! The relying party never owns credential persistence; it talks to a
//! `CredentialStore`. Two implementations live here:
//! - `memory`: a `HashMap` behind a lock, for tests and throwaway deployments
//! - `credentials`: SQLite through sqlx, used by the server binary
//!
//! `models` holds the record type both of them store.

pub mod credentials;
pub mod memory;
pub mod models;

pub use credentials::SqliteCredentialStore;
pub use memory::MemoryCredentialStore;
pub use models::CredentialRecord;

use crate::error::StoreError;
use async_trait::async_trait;

/// Lookup and persistence of registered credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<CredentialRecord>, StoreError>;

    /// Persist a newly registered credential. Fails with `Duplicate` if the id
    /// is already known.
    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError>;

    /// Compare-and-swap the signature counter.
    ///
    /// Returns `false` without writing if the stored counter is no longer
    /// `expected` (or the credential is gone).
    async fn update_counter(
        &self,
        credential_id: &[u8],
        expected: u32,
        new_count: u32,
    ) -> Result<bool, StoreError>;
}
