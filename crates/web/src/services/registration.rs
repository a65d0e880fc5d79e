//! Pre-registration flow.
//!
//! Validates and normalizes the email, consults the duplicate cache, then
//! writes to the store. The store's unique constraint is the source of truth;
//! the cache only saves round trips for emails already known to exist.

use std::sync::Arc;

use prelaunch_core::{
    Email, EmailError, NewPreRegistration, PreRegisterRequest, PreRegistration,
    RegistrationSource,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::cache::DuplicateCache;
use crate::store::{RegistrationStore, StoreError};

/// Why a registration was not created.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Email failed validation.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Email is already on the list.
    #[error("Email already registered")]
    AlreadyRegistered,

    /// Store refused the write for the current credential.
    #[error("Store permission denied: {0}")]
    PermissionDenied(#[source] StoreError),

    /// Any other store failure.
    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

/// Registration service shared through application state.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn RegistrationStore>,
    cache: DuplicateCache,
}

impl RegistrationService {
    #[must_use]
    pub fn new(store: Arc<dyn RegistrationStore>, cache: DuplicateCache) -> Self {
        Self { store, cache }
    }

    /// The store behind this service.
    #[must_use]
    pub fn store(&self) -> &dyn RegistrationStore {
        self.store.as_ref()
    }

    /// The duplicate cache in front of the store.
    #[must_use]
    pub const fn cache(&self) -> &DuplicateCache {
        &self.cache
    }

    /// Clear the duplicate cache and reload it from the store in the background.
    pub fn refresh_cache(&self) -> JoinHandle<()> {
        self.cache.refresh_in_background(Arc::clone(&self.store))
    }

    /// Register an email.
    ///
    /// Performs at most one store write and at most one cache insertion.
    ///
    /// # Errors
    ///
    /// - `InvalidEmail` if the email is empty, too long, or malformed
    /// - `AlreadyRegistered` if the cache or the store already holds it
    /// - `PermissionDenied` if the store rejects the credential
    /// - `Store` for any other store failure
    #[instrument(skip_all, fields(source = tracing::field::Empty))]
    pub async fn register(
        &self,
        request: PreRegisterRequest,
    ) -> Result<PreRegistration, RegistrationError> {
        let email = Email::parse(&request.email)?;
        let source = RegistrationSource::from_input(request.source.as_deref());
        tracing::Span::current().record("source", source.as_str());

        if self.cache.has(&email) {
            info!("Duplicate caught by cache");
            return Err(RegistrationError::AlreadyRegistered);
        }

        let registration = NewPreRegistration::new(email, source);

        match self.store.insert(&registration).await {
            Ok(record) => {
                self.cache.add(registration.email).await;
                info!(id = %record.id, "Pre-registration created");
                Ok(record)
            }
            Err(e) if e.is_unique_violation() => {
                self.cache.add(registration.email).await;
                info!("Duplicate caught by store constraint");
                Err(RegistrationError::AlreadyRegistered)
            }
            Err(e) => {
                self.log_store_error(&e);
                if e.is_permission_denied() {
                    Err(RegistrationError::PermissionDenied(e))
                } else {
                    Err(RegistrationError::Store(e))
                }
            }
        }
    }

    fn log_store_error(&self, err: &StoreError) {
        let api = err.api_error();
        error!(
            error = %err,
            code = api.and_then(|a| a.code.as_deref()),
            message = api.map(|a| a.message.as_str()),
            details = api.and_then(|a| a.details.as_deref()),
            hint = api.and_then(|a| a.hint.as_deref()),
            credential_tier = ?self.store.credential_tier(),
            "Pre-registration insert failed"
        );
    }
}
