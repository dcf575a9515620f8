//! Credential cipher
//!
//! Authenticated symmetric encryption for secret material stored by the
//! persistence layer:
//! - AES-256-GCM with a process-wide 256-bit key
//! - Fresh 96-bit random nonce per encryption
//! - Token format: `base64(nonce ‖ ciphertext ‖ tag)`
//!
//! The empty string maps to the empty string in both directions so that
//! "no secret configured" round-trips without a ciphertext.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;
use tracing::debug;

/// Required key length in bytes
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes (prepended to every ciphertext)
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes
const TAG_LEN: usize = 16;

/// Cipher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Key is not exactly 32 bytes
    #[error("Invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Key is not valid base64
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Encryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Token is not valid base64
    #[error("Invalid ciphertext encoding: {0}")]
    InvalidEncoding(String),

    /// Token too short to hold nonce and tag
    #[error("Ciphertext truncated: {len} bytes, need at least {min}")]
    Truncated {
        /// Actual length
        len: usize,
        /// Minimum length
        min: usize,
    },

    /// Tag verification failed (tampered ciphertext or wrong key)
    #[error("Decryption failed: ciphertext is corrupt or was encrypted under another key")]
    Authentication,

    /// Plaintext is not UTF-8
    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Result type for cipher operations
pub type Result<T> = std::result::Result<T, CipherError>;

/// AES-256-GCM credential cipher
///
/// Holds only the immutable key schedule, so a single instance can be shared
/// (`Arc<CredentialCipher>` or `&CredentialCipher`) across any number of
/// concurrent callers.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CredentialCipher {
    /// Create cipher from raw key bytes. Any length other than 32 is rejected.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }

        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Create cipher from a base64 (standard alphabet) encoded key
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidKeyEncoding(e.to_string()))?;
        Self::new(&key)
    }

    /// Encrypt a string into a base64 token
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let sealed = self.seal(plaintext.as_bytes())?;
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a base64 token produced by [`CredentialCipher::encrypt`]
    pub fn decrypt(&self, token: &str) -> Result<String> {
        if token.is_empty() {
            return Ok(String::new());
        }

        let sealed = BASE64
            .decode(token)
            .map_err(|e| CipherError::InvalidEncoding(e.to_string()))?;
        let plaintext = self.open(&sealed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Encrypt raw bytes into `nonce ‖ ciphertext ‖ tag`
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }
        self.seal(plaintext)
    }

    /// Decrypt bytes produced by [`CredentialCipher::encrypt_bytes`]
    pub fn decrypt_bytes(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.is_empty() {
            return Ok(Vec::new());
        }
        self.open(sealed)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut data = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&ciphertext);

        Ok(data)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let min = NONCE_LEN + TAG_LEN;
        if sealed.len() < min {
            return Err(CipherError::Truncated {
                len: sealed.len(),
                min,
            });
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Authentication)
    }
}

/// Generate a fresh random 256-bit key
pub fn generate_key() -> [u8; KEY_LEN] {
    let key = Aes256Gcm::generate_key(&mut OsRng);

    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&key);
    debug!("Generated new credential key");
    out
}

/// Generate a fresh random 256-bit key, base64 encoded for configuration files
pub fn generate_key_base64() -> String {
    BASE64.encode(generate_key())
}
