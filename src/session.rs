//! # Challenge/Session Manager
//!
//! Issues one-shot challenges bound to an opaque session token and checks the
//! challenge a client presents back.
//!
//! ## Challenge Lifecycle
//! 1. Options request → `issue_challenge()` stores a fresh challenge + user handle
//! 2. Verification → `consume_challenge()` checks it is present, fresh and equal
//! 3. Ceremony outcome → the challenge is spent (see `ChallengePolicy`)
//! 4. Expired entries are removed by `purge_expired()`, run periodically
//!
//! The storage itself is a collaborator behind the `SessionStore` trait. The
//! in-memory implementation serializes every access behind one mutex, which
//! is what stops a challenge from being spent twice.

use crate::config::{ChallengePolicy, RpConfig};
use crate::error::ChallengeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Length of the random user handle issued with each challenge.
pub const USER_HANDLE_LEN: usize = 32;

/// Which ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

/// A pending ceremony, owned by the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonySession {
    pub kind: CeremonyKind,
    pub challenge: Vec<u8>,
    pub user_handle: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub ttl: chrono::Duration,
}

impl CeremonySession {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + self.ttl
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Per-token storage for pending ceremonies.
///
/// Implementations must make each call atomic per token; `take_matching` in
/// particular is a compare-and-remove.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Option<CeremonySession>;

    /// Store `session` for `token`, replacing any pending one.
    async fn put(&self, token: &str, session: CeremonySession);

    /// Remove and return whatever is pending for `token`.
    async fn take(&self, token: &str) -> Option<CeremonySession>;

    /// Remove the pending session only if it still carries `challenge`.
    async fn take_matching(&self, token: &str, challenge: &[u8]) -> Option<CeremonySession>;

    /// Drop every session that expired before `now`. Returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

/// `SessionStore` kept in process memory.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, CeremonySession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &str) -> Option<CeremonySession> {
        self.sessions.lock().await.get(token).cloned()
    }

    async fn put(&self, token: &str, session: CeremonySession) {
        self.sessions.lock().await.insert(token.to_string(), session);
    }

    async fn take(&self, token: &str) -> Option<CeremonySession> {
        self.sessions.lock().await.remove(token)
    }

    async fn take_matching(&self, token: &str, challenge: &[u8]) -> Option<CeremonySession> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(pending) if pending.challenge == challenge => sessions.remove(token),
            _ => None,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }
}

/// What the options endpoints hand to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub challenge: Vec<u8>,
    pub user_handle: Vec<u8>,
}

/// Issues and checks challenges on top of a `SessionStore`.
#[derive(Clone)]
pub struct ChallengeManager {
    store: Arc<dyn SessionStore>,
    config: Arc<RpConfig>,
}

impl ChallengeManager {
    pub fn new(store: Arc<dyn SessionStore>, config: Arc<RpConfig>) -> Self {
        Self { store, config }
    }

    /// Generate a challenge and user handle from the OS CSPRNG and remember
    /// them for `token`. A previously pending ceremony on the token is replaced.
    pub async fn issue_challenge(&self, token: &str, kind: CeremonyKind) -> IssuedChallenge {
        let mut challenge = vec![0u8; self.config.challenge_len];
        OsRng.fill_bytes(&mut challenge);
        let mut user_handle = vec![0u8; USER_HANDLE_LEN];
        OsRng.fill_bytes(&mut user_handle);

        let session = CeremonySession {
            kind,
            challenge: challenge.clone(),
            user_handle: user_handle.clone(),
            created_at: Utc::now(),
            ttl: self.config.ceremony_ttl,
        };
        self.store.put(token, session).await;
        tracing::debug!(token, ?kind, "challenge issued");

        IssuedChallenge {
            challenge,
            user_handle,
        }
    }

    /// Check `presented` against the challenge pending for `token`.
    ///
    /// Under `SingleAttempt` the pending challenge is removed before it is
    /// compared, so whatever happens next it cannot be presented again. Under
    /// `RetryUntilExpiry` it stays until `complete()` is called.
    pub async fn consume_challenge(
        &self,
        token: &str,
        kind: CeremonyKind,
        presented: &[u8],
    ) -> Result<CeremonySession, ChallengeError> {
        let pending = match self.config.challenge_policy {
            ChallengePolicy::SingleAttempt => self.store.take(token).await,
            ChallengePolicy::RetryUntilExpiry => self.store.get(token).await,
        }
        .ok_or(ChallengeError::NotFound)?;

        if pending.kind != kind {
            return Err(ChallengeError::NotFound);
        }
        if pending.is_expired(Utc::now()) {
            self.store.take_matching(token, &pending.challenge).await;
            return Err(ChallengeError::Expired);
        }
        if pending.challenge != presented {
            return Err(ChallengeError::Mismatch);
        }
        Ok(pending)
    }

    /// Spend the challenge after the ceremony succeeded.
    ///
    /// Under `RetryUntilExpiry` two concurrent attempts may both pass
    /// `consume_challenge`; only the one that removes the entry here wins.
    pub async fn complete(&self, token: &str, session: &CeremonySession) -> Result<(), ChallengeError> {
        match self.config.challenge_policy {
            ChallengePolicy::SingleAttempt => Ok(()),
            ChallengePolicy::RetryUntilExpiry => self
                .store
                .take_matching(token, &session.challenge)
                .await
                .map(|_| ())
                .ok_or(ChallengeError::NotFound),
        }
    }

    /// Spend the pending challenge for `token` when a response is rejected
    /// before its challenge could be compared.
    ///
    /// Under `SingleAttempt` every response costs the challenge, parseable or
    /// not. Under `RetryUntilExpiry` the challenge stays pending.
    pub async fn abandon(&self, token: &str) {
        match self.config.challenge_policy {
            ChallengePolicy::SingleAttempt => {
                if self.store.take(token).await.is_some() {
                    tracing::debug!(token, "challenge abandoned");
                }
            }
            ChallengePolicy::RetryUntilExpiry => {}
        }
    }

    /// Remove expired ceremonies from the store.
    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired(Utc::now()).await
    }
}
