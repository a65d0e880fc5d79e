//! Process-local set of emails known to be registered.
//!
//! The cache only ever holds emails the store has confirmed, either by
//! listing them or by accepting or rejecting an insert for them, so a hit is
//! always a real duplicate. A miss proves nothing; the store's unique
//! constraint decides.

use std::sync::Arc;

use moka::future::Cache;
use prelaunch_core::Email;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::store::{RegistrationStore, StoreError};

/// Duplicate-suppression cache shared by all request handlers.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct DuplicateCache {
    emails: Cache<Email, ()>,
}

impl std::fmt::Debug for DuplicateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateCache")
            .field("entries", &self.emails.entry_count())
            .finish()
    }
}

impl Default for DuplicateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateCache {
    /// Create an empty, unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            emails: Cache::builder().build(),
        }
    }

    /// Whether `email` is known to be registered.
    #[must_use]
    pub fn has(&self, email: &Email) -> bool {
        self.emails.contains_key(email)
    }

    /// Record `email` as registered.
    pub async fn add(&self, email: Email) {
        self.emails.insert(email, ()).await;
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.emails.invalidate_all();
    }

    /// Load every stored email into the cache.
    ///
    /// Rows whose email does not parse are skipped. Returns the number of
    /// emails added.
    ///
    /// # Errors
    ///
    /// Returns the store error if the scan fails; entries added before the
    /// failure are kept.
    #[instrument(skip_all)]
    pub async fn repopulate(&self, store: &dyn RegistrationStore) -> Result<usize, StoreError> {
        let emails = store.list_emails().await?;
        let mut added = 0;

        for raw in emails {
            match Email::parse(&raw) {
                Ok(email) => {
                    self.add(email).await;
                    added += 1;
                }
                Err(e) => warn!(error = %e, "Skipping stored row with unparseable email"),
            }
        }

        Ok(added)
    }

    /// Clear the cache and repopulate it from `store` on a background task.
    ///
    /// Errors are logged and dropped. The handle is returned so callers that
    /// care (tests, startup) can wait for completion.
    pub fn refresh_in_background(&self, store: Arc<dyn RegistrationStore>) -> JoinHandle<()> {
        self.clear();
        let cache = self.clone();

        tokio::spawn(async move {
            match cache.repopulate(store.as_ref()).await {
                Ok(count) => info!(count, "Duplicate cache repopulated"),
                Err(e) => error!(error = %e, "Failed to repopulate duplicate cache"),
            }
        })
    }
}
