//! At-rest form of tenant credentials
//!
//! [`StoredCredentials`] is what the persistence layer keeps: client id,
//! client secret and mTLS material are sealed with the [`CredentialCipher`];
//! account identifiers stay readable. [`StoredCredentials::seal`] and
//! [`StoredCredentials::open`] are the only conversions.

use crate::{AccountType, ClientCertificate, PixKeyType, ProviderCredentials};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pix_security::{CipherError, CredentialCipher};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sealing/opening errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    /// Cipher rejected the value
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Sealed blob is not valid base64
    #[error("Invalid sealed {field}: {reason}")]
    InvalidEncoding {
        /// Column
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Certificate stored without its private key, or the reverse
    #[error("Certificate and private key must be stored together")]
    IncompleteCertificate,
}

/// Encrypted credential row
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Sealed OAuth2 client id
    pub client_id: String,
    /// Sealed OAuth2 client secret
    pub client_secret: String,
    /// Sealed certificate PEM (base64), empty when none
    #[serde(default)]
    pub certificate_data: String,
    /// Sealed private key PEM (base64), empty when none
    #[serde(default)]
    pub private_key_data: String,
    /// Account agency
    #[serde(default)]
    pub account_agency: String,
    /// Account number
    #[serde(default)]
    pub account_number: String,
    /// `checking` / `savings`
    #[serde(default)]
    pub account_type: String,
    /// Tenant PIX key
    #[serde(default)]
    pub pix_key: String,
    /// Tenant PIX key type
    #[serde(default)]
    pub pix_key_type: String,
}

impl StoredCredentials {
    /// Encrypt plaintext credentials for storage
    pub fn seal(
        credentials: &ProviderCredentials,
        cipher: &CredentialCipher,
    ) -> Result<Self, CredentialsError> {
        let (certificate_data, private_key_data) = match &credentials.certificate {
            Some(certificate) => (
                seal_bytes(cipher, &certificate.certificate)?,
                seal_bytes(cipher, &certificate.private_key)?,
            ),
            None => (String::new(), String::new()),
        };

        Ok(Self {
            client_id: cipher.encrypt(&credentials.client_id)?,
            client_secret: cipher.encrypt(&credentials.client_secret)?,
            certificate_data,
            private_key_data,
            account_agency: credentials.account_agency.clone(),
            account_number: credentials.account_number.clone(),
            account_type: credentials.account_type.as_str().to_string(),
            pix_key: credentials.pix_key.clone().unwrap_or_default(),
            pix_key_type: credentials
                .pix_key_type
                .map(|key_type| key_type.as_str().to_string())
                .unwrap_or_default(),
        })
    }

    /// Decrypt into call-scope credentials
    pub fn open(&self, cipher: &CredentialCipher) -> Result<ProviderCredentials, CredentialsError> {
        let certificate = match (
            open_bytes(cipher, "certificate_data", &self.certificate_data)?,
            open_bytes(cipher, "private_key_data", &self.private_key_data)?,
        ) {
            (None, None) => None,
            (Some(certificate), Some(private_key)) => Some(ClientCertificate {
                certificate,
                private_key,
            }),
            _ => return Err(CredentialsError::IncompleteCertificate),
        };

        Ok(ProviderCredentials {
            client_id: cipher.decrypt(&self.client_id)?,
            client_secret: cipher.decrypt(&self.client_secret)?,
            certificate,
            account_agency: self.account_agency.clone(),
            account_number: self.account_number.clone(),
            account_type: AccountType::from_code_lossy(&self.account_type),
            pix_key: Some(self.pix_key.clone()).filter(|key| !key.is_empty()),
            pix_key_type: Some(self.pix_key_type.as_str())
                .filter(|key_type| !key_type.is_empty())
                .map(PixKeyType::from_code_lossy),
        })
    }
}

fn seal_bytes(cipher: &CredentialCipher, plaintext: &[u8]) -> Result<String, CredentialsError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    Ok(BASE64.encode(cipher.encrypt_bytes(plaintext)?))
}

fn open_bytes(
    cipher: &CredentialCipher,
    field: &'static str,
    sealed: &str,
) -> Result<Option<Vec<u8>>, CredentialsError> {
    if sealed.is_empty() {
        return Ok(None);
    }

    let sealed = BASE64
        .decode(sealed)
        .map_err(|e| CredentialsError::InvalidEncoding {
            field,
            reason: e.to_string(),
        })?;
    Ok(Some(cipher.decrypt_bytes(&sealed)?))
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("account_agency", &self.account_agency)
            .field("account_number", &self.account_number)
            .field("account_type", &self.account_type)
            .field("has_certificate", &!self.certificate_data.is_empty())
            .finish_non_exhaustive()
    }
}
