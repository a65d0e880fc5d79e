//! Encryption helpers for environment secrets.
//!
//! # Usage
//!
//! ```bash
//! prelaunch-cli keygen
//! ENV_ENCRYPTION_KEY=<hex> prelaunch-cli encrypt "<service role key>"
//! ```
//!
//! Put the printed `iv:tag:ciphertext` value in `SUPABASE_SERVICE_ROLE_KEY`
//! (or any other store variable) and set `ENV_ENCRYPTION_KEY` on the server.

use prelaunch_web::crypto::{self, CryptoError, EnvCipher};
use thiserror::Error;

/// Errors that can occur during secret operations.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Key or value rejected by the cipher.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

fn cipher_from_env() -> Result<EnvCipher, SecretsError> {
    dotenvy::dotenv().ok();

    let key = std::env::var(crypto::KEY_ENV_VAR)
        .map_err(|_| SecretsError::MissingEnvVar(crypto::KEY_ENV_VAR))?;
    Ok(EnvCipher::from_hex_key(&key)?)
}

/// Print a fresh hex-encoded key.
#[allow(clippy::print_stdout)]
pub fn keygen() {
    println!("{}", EnvCipher::generate_key());
}

/// Encrypt `plaintext` and print the encoded value.
///
/// # Errors
///
/// Returns error if the key is missing or invalid.
#[allow(clippy::print_stdout)]
pub fn encrypt(plaintext: &str) -> Result<(), SecretsError> {
    let encoded = cipher_from_env()?.encrypt(plaintext)?;
    println!("{encoded}");
    Ok(())
}

/// Decrypt an encoded value and print the plaintext.
///
/// # Errors
///
/// Returns error if the key is missing or the value does not decrypt.
#[allow(clippy::print_stdout)]
pub fn decrypt(value: &str) -> Result<(), SecretsError> {
    let plaintext = cipher_from_env()?.decrypt(value)?;
    println!("{plaintext}");
    Ok(())
}
