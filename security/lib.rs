//! Security primitives for PixHub
//!
//! Protects long-lived per-tenant banking credentials at rest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        Persistence (encrypted credential rows)       │
//! └────────────────────────┬────────────────────────────┘
//!                          │ base64(nonce ‖ ciphertext ‖ tag)
//! ┌────────────────────────▼────────────────────────────┐
//! │      CredentialCipher (AES-256-GCM, 256-bit key)     │
//! └────────────────────────┬────────────────────────────┘
//!                          │ plaintext, call scope only
//! ┌────────────────────────▼────────────────────────────┐
//! │                 Bank adapters                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use pix_security::{generate_key_base64, CredentialCipher};
//!
//! # fn example() -> Result<(), pix_security::CipherError> {
//! let key = generate_key_base64();
//! let cipher = CredentialCipher::from_base64_key(&key)?;
//!
//! let sealed = cipher.encrypt("client-secret")?;
//! assert_eq!(cipher.decrypt(&sealed)?, "client-secret");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod cipher;

pub use cipher::{
    generate_key, generate_key_base64, CipherError, CredentialCipher, Result, KEY_LEN, NONCE_LEN,
};
