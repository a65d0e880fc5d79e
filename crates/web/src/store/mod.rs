//! Persistence boundary for pre-registrations.
//!
//! The production store is a hosted PostgREST API in front of Postgres
//! ([`PostgrestStore`]). [`InMemoryStore`] implements the same trait with the
//! same uniqueness rule and is used by tests.

mod memory;
mod postgrest;

pub use memory::{InMemoryStore, InjectedFailure};
pub use postgrest::PostgrestStore;

use async_trait::async_trait;
use prelaunch_core::{NewPreRegistration, PreRegistration};
use serde::Deserialize;
use thiserror::Error;

use crate::config::CredentialTier;

/// Postgres SQLSTATE for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Postgres SQLSTATE for insufficient privilege (row-level policy rejection).
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Error body returned by the store API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Errors that can occur when talking to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed (connection, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store rejected the request.
    #[error("API error: {status} - {}", .error.message)]
    Api { status: u16, error: ApiError },

    /// Response could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Build an API error carrying a SQLSTATE code.
    #[must_use]
    pub fn with_code(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error: ApiError {
                code: Some(code.to_string()),
                message: message.into(),
                ..ApiError::default()
            },
        }
    }

    /// The store's error code, if it sent one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { error, .. } => error.code.as_deref(),
            _ => None,
        }
    }

    /// The structured error body, if the store sent one.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The email already exists.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }

    /// The credential is not allowed to write the table.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Api { error, .. } => {
                error.code.as_deref() == Some(INSUFFICIENT_PRIVILEGE)
                    || error.message.to_lowercase().contains("permission")
            }
            _ => false,
        }
    }
}

/// Storage operations the registration flow needs.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Insert one registration and return the stored row.
    ///
    /// A duplicate email fails with a [`UNIQUE_VIOLATION`] error.
    async fn insert(&self, registration: &NewPreRegistration)
    -> Result<PreRegistration, StoreError>;

    /// Every stored email, in insertion order.
    async fn list_emails(&self) -> Result<Vec<String>, StoreError>;

    /// Cheap round trip to confirm the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Privilege level of the credential in use.
    fn credential_tier(&self) -> CredentialTier;
}
