//! PostgREST client for the hosted registration table.

use async_trait::async_trait;
use prelaunch_core::{NewPreRegistration, PreRegistration};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{ApiError, RegistrationStore, StoreError};
use crate::config::{CredentialTier, StoreConfig};

/// Rows fetched per page when scanning emails.
const PAGE_SIZE: usize = 1000;

/// REST path prefix under the project URL.
const REST_PATH: &str = "rest/v1";

#[derive(Debug, Deserialize)]
struct EmailRow {
    email: String,
}

/// Store client speaking PostgREST over HTTPS.
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    table_url: Url,
    tier: CredentialTier,
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("table_url", &self.table_url.as_str())
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

impl PostgrestStore {
    /// Create a client for the configured table.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value, the table URL
    /// cannot be built, or the HTTP client fails to build.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let key = config.credential.key.expose_secret();

        let mut headers = HeaderMap::new();

        let mut api_key = HeaderValue::from_str(key)
            .map_err(|e| StoreError::Parse(format!("Invalid API key format: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static("apikey"), api_key);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| StoreError::Parse(format!("Invalid API key format: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            table_url: table_url(&config.url, &config.table)?,
            tier: config.credential.tier(),
        })
    }

    /// Table URL with PostgREST query parameters appended.
    fn query_url(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut().extend_pairs(pairs);
        url
    }

    /// Turn a non-success response into a `StoreError::Api`.
    async fn api_error(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ApiError>(&body).unwrap_or(ApiError {
            message: body,
            ..ApiError::default()
        });
        StoreError::Api { status, error }
    }
}

/// `{base}/rest/v1/{table}`, tolerating a trailing slash on the base.
fn table_url(base: &Url, table: &str) -> Result<Url, StoreError> {
    let raw = format!(
        "{}/{REST_PATH}/{}",
        base.as_str().trim_end_matches('/'),
        urlencoding::encode(table)
    );
    Url::parse(&raw).map_err(|e| StoreError::Parse(format!("Invalid store URL: {e}")))
}

/// First row of a `return=representation` insert response.
fn inserted_row(body: &str) -> Result<PreRegistration, StoreError> {
    let rows: Vec<PreRegistration> =
        serde_json::from_str(body).map_err(|e| StoreError::Parse(e.to_string()))?;

    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Parse("insert returned no rows".to_string()))
}

#[async_trait]
impl RegistrationStore for PostgrestStore {
    #[instrument(skip(self, registration), fields(source = %registration.source))]
    async fn insert(
        &self,
        registration: &NewPreRegistration,
    ) -> Result<PreRegistration, StoreError> {
        let response = self
            .client
            .post(self.table_url.clone())
            .header("Prefer", "return=representation")
            .json(registration)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body = response.text().await?;
        inserted_row(&body)
    }

    #[instrument(skip(self))]
    async fn list_emails(&self) -> Result<Vec<String>, StoreError> {
        let mut emails = Vec::new();
        let limit = PAGE_SIZE.to_string();

        loop {
            let offset = emails.len().to_string();
            let url = self.query_url(&[
                ("select", "email"),
                ("order", "id.asc"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ]);
            let response = self.client.get(url).send().await?;

            if !response.status().is_success() {
                return Err(Self::api_error(response).await);
            }

            let page: Vec<EmailRow> = response
                .json()
                .await
                .map_err(|e| StoreError::Parse(e.to_string()))?;

            let fetched = page.len();
            emails.extend(page.into_iter().map(|row| row.email));
            debug!(fetched, total = emails.len(), "Fetched email page");

            if fetched < PAGE_SIZE {
                return Ok(emails);
            }
        }
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> Result<(), StoreError> {
        let url = self.query_url(&[("select", "id"), ("limit", "1")]);
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    fn credential_tier(&self) -> CredentialTier {
        self.tier
    }
}
