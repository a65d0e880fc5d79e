//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPABASE_URL` - Base URL of the hosted store (PostgREST lives under `/rest/v1`)
//! - `SUPABASE_SERVICE_ROLE_KEY` and/or `SUPABASE_ANON_KEY` - Store credentials
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 3000)
//! - `SUPABASE_TABLE` - Registration table (default: `pre_reservations_list`)
//! - `STORE_TIMEOUT_SECS` - Per-request store timeout (default: 10)
//! - `REGISTER_RATE_LIMIT_MAX` / `REGISTER_RATE_LIMIT_WINDOW_SECS` - default 5 per 3600s
//! - `API_RATE_LIMIT_MAX` / `API_RATE_LIMIT_WINDOW_SECS` - default 100 per 900s
//! - `STATIC_DIR` - Static asset directory (default: crates/web/static)
//! - `ENV_ENCRYPTION_KEY` - Hex AES-256 key for encrypted values
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//!
//! Any of the store variables may hold an `iv:tag:ciphertext` value produced
//! by `prelaunch-cli encrypt`; it is decrypted with `ENV_ENCRYPTION_KEY`
//! before use.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::crypto::{self, CryptoError, EnvCipher};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Prefix of publishable (client-safe) keys, which never carry write privileges.
const PUBLISHABLE_KEY_PREFIX: &str = "sb_publishable_";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Cannot decrypt {0}: {1}")]
    Decrypt(String, CryptoError),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Hosted store connection
    pub store: StoreConfig,
    /// Per-IP admission limits
    pub rate_limits: RateLimitConfig,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
}

/// Which credential tier the store client holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialTier {
    /// Service-role key; bypasses row-level policy.
    Privileged,
    /// Anon or publishable key; writes may be rejected by row-level policy.
    Restricted,
}

/// Where the chosen credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ServiceRoleKey,
    AnonKey,
    /// `SUPABASE_SERVICE_ROLE_KEY` held a publishable key and no anon key was set.
    MisplacedPublishableKey,
}

/// Store credential plus the tier it grants.
#[derive(Clone)]
pub struct StoreCredential {
    pub source: CredentialSource,
    pub key: SecretString,
}

impl StoreCredential {
    #[must_use]
    pub const fn tier(&self) -> CredentialTier {
        match self.source {
            CredentialSource::ServiceRoleKey => CredentialTier::Privileged,
            CredentialSource::AnonKey | CredentialSource::MisplacedPublishableKey => {
                CredentialTier::Restricted
            }
        }
    }

    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self.tier(), CredentialTier::Privileged)
    }
}

impl std::fmt::Debug for StoreCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredential")
            .field("source", &self.source)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Hosted store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project base URL (e.g. `https://abc.supabase.co`)
    pub url: Url,
    /// Registration table name
    pub table: String,
    /// Credential used for every request
    pub credential: StoreCredential,
    /// Per-request timeout
    pub timeout: Duration,
}

/// A fixed budget of requests per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

/// Limits for the two per-IP limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Applies to `POST /api/pre-register` only.
    pub register: RateLimit,
    /// Applies to everything under `/api`.
    pub api: RateLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            register: RateLimit {
                max_requests: 5,
                window: Duration::from_secs(60 * 60),
            },
            api: RateLimit {
                max_requests: 100,
                window: Duration::from_secs(15 * 60),
            },
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid,
    /// cannot be decrypted, or if credentials fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let cipher = get_optional_env(crypto::KEY_ENV_VAR)
            .map(|key| {
                EnvCipher::from_hex_key(&key)
                    .map_err(|e| ConfigError::Decrypt(crypto::KEY_ENV_VAR.to_string(), e))
            })
            .transpose()?;

        let host = get_parsed_or_default("HOST", "0.0.0.0")?;
        let port = get_parsed_or_default("PORT", "3000")?;
        let store = StoreConfig::from_env(cipher.as_ref())?;
        let rate_limits = RateLimitConfig::from_env()?;
        let static_dir = PathBuf::from(get_env_or_default("STATIC_DIR", "crates/web/static"));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let json_logs =
            get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        Ok(Self {
            host,
            port,
            store,
            rate_limits,
            static_dir,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            json_logs,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StoreConfig {
    fn from_env(cipher: Option<&EnvCipher>) -> Result<Self, ConfigError> {
        let raw_url = resolve_value("SUPABASE_URL", get_required_env("SUPABASE_URL")?, cipher)?;
        let url = Url::parse(raw_url.trim())
            .map_err(|e| ConfigError::InvalidEnvVar("SUPABASE_URL".to_string(), e.to_string()))?;

        let service_key = get_optional_secret("SUPABASE_SERVICE_ROLE_KEY", cipher)?;
        let anon_key = get_optional_secret("SUPABASE_ANON_KEY", cipher)?;
        let credential = select_credential(service_key, anon_key)?;

        let table = get_env_or_default("SUPABASE_TABLE", "pre_reservations_list");
        let timeout = Duration::from_secs(get_parsed_or_default("STORE_TIMEOUT_SECS", "10")?);

        Ok(Self {
            url,
            table,
            credential,
            timeout,
        })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            register: rate_limit_from_env("REGISTER_RATE_LIMIT", defaults.register)?,
            api: rate_limit_from_env("API_RATE_LIMIT", defaults.api)?,
        })
    }
}

fn rate_limit_from_env(prefix: &str, default: RateLimit) -> Result<RateLimit, ConfigError> {
    let max_key = format!("{prefix}_MAX");
    let window_key = format!("{prefix}_WINDOW_SECS");

    let max_requests: u32 =
        get_parsed_or_default(&max_key, &default.max_requests.to_string())?;
    let window_secs: u64 =
        get_parsed_or_default(&window_key, &default.window.as_secs().to_string())?;

    if max_requests == 0 {
        return Err(ConfigError::InvalidEnvVar(max_key, "must be at least 1".to_string()));
    }
    if window_secs == 0 {
        return Err(ConfigError::InvalidEnvVar(window_key, "must be at least 1".to_string()));
    }

    Ok(RateLimit {
        max_requests,
        window: Duration::from_secs(window_secs),
    })
}

/// Pick the store credential, preferring a real service-role key.
///
/// A publishable key placed in the service-role slot is only used when no
/// anon key is available.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` when neither key is set.
pub fn select_credential(
    service_key: Option<SecretString>,
    anon_key: Option<SecretString>,
) -> Result<StoreCredential, ConfigError> {
    match (service_key, anon_key) {
        (Some(key), _) if !is_publishable_key(key.expose_secret()) => Ok(StoreCredential {
            source: CredentialSource::ServiceRoleKey,
            key,
        }),
        (_, Some(key)) => Ok(StoreCredential {
            source: CredentialSource::AnonKey,
            key,
        }),
        (Some(key), None) => Ok(StoreCredential {
            source: CredentialSource::MisplacedPublishableKey,
            key,
        }),
        (None, None) => Err(ConfigError::MissingEnvVar(
            "SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY".to_string(),
        )),
    }
}

fn is_publishable_key(key: &str) -> bool {
    key.starts_with(PUBLISHABLE_KEY_PREFIX)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Decrypt `value` if it is in the encrypted encoding.
fn resolve_value(
    key: &str,
    value: String,
    cipher: Option<&EnvCipher>,
) -> Result<String, ConfigError> {
    if !EnvCipher::looks_encrypted(&value) {
        return Ok(value);
    }

    let cipher = cipher.ok_or_else(|| {
        ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("value is encrypted but {} is not set", crypto::KEY_ENV_VAR),
        )
    })?;

    cipher
        .decrypt(&value)
        .map_err(|e| ConfigError::Decrypt(key.to_string(), e))
}

/// Load, decrypt and validate an optional secret.
fn get_optional_secret(
    key: &str,
    cipher: Option<&EnvCipher>,
) -> Result<Option<SecretString>, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(None);
    };
    let value = resolve_value(key, raw, cipher)?;
    let value = value.trim();
    validate_secret_strength(value, key)?;
    Ok(Some(SecretString::from(value.to_owned())))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys and JWTs are long random strings
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the store."
            ),
        ));
    }

    Ok(())
}
