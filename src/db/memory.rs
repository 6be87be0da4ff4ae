//! In-memory `CredentialStore`.

use super::models::CredentialRecord;
use super::CredentialStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<Vec<u8>, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().await.get(credential_id).cloned())
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        // Hold the write lock across check and insert
        let mut records = self.records.write().await;
        if records.contains_key(&record.credential_id) {
            return Err(StoreError::Duplicate);
        }
        records.insert(record.credential_id.clone(), record.clone());
        Ok(())
    }

    async fn update_counter(
        &self,
        credential_id: &[u8],
        expected: u32,
        new_count: u32,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(credential_id) {
            // Only write if nobody moved the counter since it was read
            Some(record) if record.sign_count == expected => {
                record.sign_count = new_count;
                Ok(true)
            }
            // Counter moved or credential gone
            _ => Ok(false),
        }
    }
}
