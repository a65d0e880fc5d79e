//! In-process store with the same uniqueness rule as the hosted table.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use prelaunch_core::{Email, NewPreRegistration, PreRegistration, RegistrationId};
use tokio::sync::Mutex;

use super::{INSUFFICIENT_PRIVILEGE, RegistrationStore, StoreError, UNIQUE_VIOLATION};
use crate::config::CredentialTier;

/// Failure the next store call should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Row-level policy rejects the write.
    PermissionDenied,
    /// Store is unreachable or broken.
    Unavailable,
}

impl InjectedFailure {
    fn into_error(self) -> StoreError {
        match self {
            Self::PermissionDenied => StoreError::with_code(
                401,
                INSUFFICIENT_PRIVILEGE,
                "new row violates row-level security policy",
            ),
            Self::Unavailable => StoreError::with_code(503, "PGRST000", "store unavailable"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<PreRegistration>,
    failure: Option<InjectedFailure>,
}

/// Store backed by a `Vec`, for tests and local runs.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    insert_attempts: AtomicUsize,
    tier: CredentialTier,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            insert_attempts: AtomicUsize::new(0),
            tier: CredentialTier::Privileged,
        }
    }

    /// Report a restricted credential tier.
    #[must_use]
    pub const fn restricted(mut self) -> Self {
        self.tier = CredentialTier::Restricted;
        self
    }

    /// Write a row directly, bypassing any cache in front of the store.
    pub async fn seed(&self, email: Email) -> PreRegistration {
        let mut inner = self.inner.lock().await;
        let row = PreRegistration {
            id: next_id(&inner.rows),
            email,
            source: prelaunch_core::RegistrationSource::unspecified(),
            created_at: Some(Utc::now()),
        };
        inner.rows.push(row.clone());
        row
    }

    /// Make every following call fail until [`Self::recover`] is called.
    pub async fn fail_with(&self, failure: InjectedFailure) {
        self.inner.lock().await.failure = Some(failure);
    }

    /// Clear an injected failure.
    pub async fn recover(&self) {
        self.inner.lock().await.failure = None;
    }

    /// Stored rows, in insertion order.
    pub async fn rows(&self) -> Vec<PreRegistration> {
        self.inner.lock().await.rows.clone()
    }

    /// Number of `insert` calls received, including rejected ones.
    #[must_use]
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }
}

fn next_id(rows: &[PreRegistration]) -> RegistrationId {
    let last = rows
        .iter()
        .filter_map(|row| row.id.as_i64())
        .max()
        .unwrap_or(0);
    RegistrationId::new(last + 1)
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn insert(
        &self,
        registration: &NewPreRegistration,
    ) -> Result<PreRegistration, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;

        if let Some(failure) = inner.failure {
            return Err(failure.into_error());
        }

        if inner.rows.iter().any(|row| row.email == registration.email) {
            return Err(StoreError::with_code(
                409,
                UNIQUE_VIOLATION,
                "duplicate key value violates unique constraint \"pre_reservations_list_email_key\"",
            ));
        }

        let row = PreRegistration {
            id: next_id(&inner.rows),
            email: registration.email.clone(),
            source: registration.source.clone(),
            created_at: Some(Utc::now()),
        };
        inner.rows.push(row.clone());
        Ok(row)
    }

    async fn list_emails(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().await;
        if let Some(failure) = inner.failure {
            return Err(failure.into_error());
        }
        Ok(inner
            .rows
            .iter()
            .map(|row| row.email.as_str().to_string())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        match self.inner.lock().await.failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }

    fn credential_tier(&self) -> CredentialTier {
        self.tier
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use prelaunch_core::RegistrationSource;

    use super::*;

    fn registration(email: &str) -> NewPreRegistration {
        NewPreRegistration::new(Email::parse(email).unwrap(), RegistrationSource::unspecified())
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = InMemoryStore::new();
        let first = store.insert(&registration("a@example.com")).await.unwrap();
        let second = store.insert(&registration("b@example.com")).await.unwrap();
        assert_eq!(first.id, RegistrationId::new(1));
        assert_eq!(second.id, RegistrationId::new(2));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_unique_violation() {
        let store = InMemoryStore::new();
        store.insert(&registration("a@example.com")).await.unwrap();
        let err = store
            .insert(&registration("A@Example.com"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_until_recovered() {
        let store = InMemoryStore::new();
        store.fail_with(InjectedFailure::PermissionDenied).await;
        let err = store
            .insert(&registration("a@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_permission_denied());
        assert!(store.ping().await.is_err());

        store.recover().await;
        assert!(store.ping().await.is_ok());
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test]
    async fn test_list_emails_in_insertion_order() {
        let store = InMemoryStore::new();
        store.seed(Email::parse("z@example.com").unwrap()).await;
        store.insert(&registration("a@example.com")).await.unwrap();
        assert_eq!(
            store.list_emails().await.unwrap(),
            vec!["z@example.com", "a@example.com"]
        );
    }
}
