//! Application state shared across handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::DuplicateCache;
use crate::config::{RateLimitConfig, WebConfig};
use crate::services::RegistrationService;
use crate::store::{PostgrestStore, RegistrationStore, StoreError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// registration service and the settings the router is built from.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registrations: RegistrationService,
    rate_limits: RateLimitConfig,
    static_dir: PathBuf,
}

impl AppState {
    /// Create application state around any store.
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        rate_limits: RateLimitConfig,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registrations: RegistrationService::new(store, DuplicateCache::new()),
                rate_limits,
                static_dir: static_dir.into(),
            }),
        }
    }

    /// Create application state backed by the hosted store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store client cannot be built.
    pub fn from_config(config: &WebConfig) -> Result<Self, StoreError> {
        let store = PostgrestStore::new(&config.store)?;
        Ok(Self::new(
            Arc::new(store),
            config.rate_limits,
            config.static_dir.clone(),
        ))
    }

    /// Get a reference to the registration service.
    #[must_use]
    pub fn registrations(&self) -> &RegistrationService {
        &self.inner.registrations
    }

    /// Get the configured rate limits.
    #[must_use]
    pub fn rate_limits(&self) -> RateLimitConfig {
        self.inner.rate_limits
    }

    /// Get the static asset directory.
    #[must_use]
    pub fn static_dir(&self) -> &Path {
        &self.inner.static_dir
    }
}
