//! Decryption of pre-encrypted environment values.
//!
//! Secrets may be delivered encrypted with AES-256-GCM so they never sit in
//! plain text in deployment manifests. An encrypted value is three hex
//! segments joined by colons:
//!
//! ```text
//! <iv: 12 bytes>:<auth tag: 16 bytes>:<ciphertext>
//! ```
//!
//! The 32-byte key is supplied separately as 64 hex characters in
//! `ENV_ENCRYPTION_KEY`.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use rand::Rng;
use thiserror::Error;

/// Environment variable holding the hex-encoded key.
pub const KEY_ENV_VAR: &str = "ENV_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Errors from encrypting or decrypting an environment value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encryption key must be {KEY_LEN} bytes of hex")]
    InvalidKey,
    #[error("encrypted value is malformed: {0}")]
    Malformed(&'static str),
    #[error("decryption failed (wrong key or tampered value)")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
    #[error("decrypted value is not valid UTF-8")]
    Utf8,
}

/// AES-256-GCM cipher for environment secrets.
///
/// Implements `Debug` manually so the key never reaches logs.
#[derive(Clone)]
pub struct EnvCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EnvCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCipher").field("key", &"[REDACTED]").finish()
    }
}

impl EnvCipher {
    /// Build a cipher from a 64-character hex key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the key is not 32 bytes of hex.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| CryptoError::InvalidKey)?;
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Generate a fresh random key, hex-encoded.
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::rng().fill(&mut key);
        hex::encode(key)
    }

    /// Whether `value` has the `iv:tag:ciphertext` shape.
    ///
    /// URLs and API keys never match: the first two segments must be pure
    /// hex of exactly the IV and tag lengths.
    #[must_use]
    pub fn looks_encrypted(value: &str) -> bool {
        let mut parts = value.trim().split(':');
        let (Some(iv), Some(tag), Some(body), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let is_hex = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit());
        iv.len() == IV_LEN * 2
            && tag.len() == TAG_LEN * 2
            && is_hex(iv)
            && is_hex(tag)
            && is_hex(body)
    }

    /// Encrypt `plaintext` into the `iv:tag:ciphertext` encoding.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encrypt` if the cipher rejects the input.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(buffer)
        ))
    }

    /// Decrypt an `iv:tag:ciphertext` value.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Malformed` for a bad encoding,
    /// `CryptoError::Decrypt` if authentication fails, and
    /// `CryptoError::Utf8` if the plaintext is not text.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let mut parts = encoded.trim().split(':');
        let (Some(iv_hex), Some(tag_hex), Some(body_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::Malformed("expected iv:tag:ciphertext"));
        };

        let iv = hex::decode(iv_hex).map_err(|_| CryptoError::Malformed("iv is not hex"))?;
        let tag = hex::decode(tag_hex).map_err(|_| CryptoError::Malformed("tag is not hex"))?;
        let mut buffer =
            hex::decode(body_hex).map_err(|_| CryptoError::Malformed("ciphertext is not hex"))?;

        if iv.len() != IV_LEN {
            return Err(CryptoError::Malformed("iv must be 12 bytes"));
        }
        if tag.len() != TAG_LEN {
            return Err(CryptoError::Malformed("tag must be 16 bytes"));
        }

        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&iv),
                b"",
                &mut buffer,
                Tag::from_slice(&tag),
            )
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(buffer).map_err(|_| CryptoError::Utf8)
    }
}
