//! Settings (file + `PIX__*` environment overrides)
//!
//! ```toml
//! [encryption]
//! key = "base64 32-byte key"
//!
//! [health]
//! freshness_seconds = 300
//!
//! [providers.itau]
//! base_url = "https://api.itau.com.br"
//! auth_url = "https://sts.itau.com.br/api/oauth/token"
//! requires_mtls = true
//! priority = 10
//! ```
//!
//! `PIX__PROVIDERS__ITAU__TIMEOUT_SECONDS=10` overrides a single field.

use crate::{ProviderConfig, ProviderError, DEFAULT_HEALTH_FRESHNESS_SECONDS};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use pix_security::{CipherError, CredentialCipher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment prefix
pub const ENV_PREFIX: &str = "PIX";

/// Settings and bootstrap errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Source could not be read or deserialized
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Encryption key rejected
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// `encryption.key` not set
    #[error("encryption.key is not configured")]
    MissingKey,

    /// Settings name a provider with no adapter
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Adapter rejected its config
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Credential cipher settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    /// Base64 256-bit key
    #[serde(default)]
    pub key: Option<String>,
}

/// Health selection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSettings {
    /// How long a successful check keeps a provider eligible
    pub freshness_seconds: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            freshness_seconds: DEFAULT_HEALTH_FRESHNESS_SECONDS,
        }
    }
}

impl HealthSettings {
    /// Freshness window
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_seconds)
    }
}

/// One configured provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Connection policy handed to `initialize`
    #[serde(flatten)]
    pub config: ProviderConfig,
    /// Selection priority (higher wins)
    #[serde(default)]
    pub priority: i32,
    /// Register this provider
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Root settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Credential cipher
    #[serde(default)]
    pub encryption: EncryptionSettings,
    /// Health selection
    #[serde(default)]
    pub health: HealthSettings,
    /// Providers by code
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

impl Settings {
    /// Load from an optional file, then `PIX__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Self::builder()?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parse settings from a string (no environment overrides)
    pub fn parse(contents: &str, format: FileFormat) -> Result<Self, SettingsError> {
        let settings = Self::builder()?
            .add_source(File::from_str(contents, format))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    fn builder() -> Result<ConfigBuilder<config::builder::DefaultState>, SettingsError> {
        Ok(Config::builder()
            .set_default(
                "health.freshness_seconds",
                DEFAULT_HEALTH_FRESHNESS_SECONDS as i64,
            )?)
    }

    /// Credential cipher from `encryption.key`
    pub fn cipher(&self) -> Result<CredentialCipher, SettingsError> {
        let key = self
            .encryption
            .key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SettingsError::MissingKey)?;
        Ok(CredentialCipher::from_base64_key(key)?)
    }

    /// Enabled providers
    pub fn enabled_providers(&self) -> impl Iterator<Item = (&String, &ProviderSettings)> {
        self.providers.iter().filter(|(_, settings)| settings.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [encryption]
        key = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8="

        [providers.inter]
        base_url = "https://cdpj.partners.bancointer.com.br"
        auth_url = "https://cdpj.partners.bancointer.com.br/oauth/v2/token"
        priority = 10

        [providers.itau]
        base_url = "https://api.itau.com.br"
        auth_url = "https://sts.itau.com.br/api/oauth/token"
        sandbox_url = "https://sandbox.devportal.itau.com.br"
        sandbox = true
        requires_mtls = true
        timeout_seconds = 10
        enabled = false
    "#;

    #[test]
    fn test_parse_with_defaults() {
        let settings = Settings::parse(SAMPLE, FileFormat::Toml).unwrap();

        assert_eq!(settings.health.freshness_seconds, DEFAULT_HEALTH_FRESHNESS_SECONDS);

        let inter = &settings.providers["inter"];
        assert_eq!(inter.priority, 10);
        assert!(inter.enabled);
        assert_eq!(inter.config.timeout_seconds, crate::DEFAULT_REQUEST_TIMEOUT_SECONDS);
        assert_eq!(inter.config.max_retries, crate::DEFAULT_MAX_RETRIES);
        assert!(!inter.config.requires_mtls);

        let itau = &settings.providers["itau"];
        assert!(!itau.enabled);
        assert!(itau.config.requires_mtls);
        assert_eq!(itau.config.timeout_seconds, 10);
        assert_eq!(itau.config.api_base_url(), "https://sandbox.devportal.itau.com.br");

        let enabled: Vec<_> = settings.enabled_providers().map(|(code, _)| code).collect();
        assert_eq!(enabled, vec!["inter"]);
    }

    #[test]
    fn test_cipher_from_settings() {
        let settings = Settings::parse(SAMPLE, FileFormat::Toml).unwrap();
        let cipher = settings.cipher().unwrap();

        let sealed = cipher.encrypt("secret").unwrap();
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "secret");
    }

    #[test]
    fn test_cipher_errors() {
        let settings = Settings::default();
        assert!(matches!(settings.cipher(), Err(SettingsError::MissingKey)));

        let settings = Settings {
            encryption: EncryptionSettings {
                key: Some("c2hvcnQ=".to_string()),
            },
            ..Default::default()
        };
        assert!(matches!(
            settings.cipher(),
            Err(SettingsError::Cipher(CipherError::InvalidKeyLength(5)))
        ));
    }

    #[test]
    fn test_missing_endpoint_is_config_error() {
        let err = Settings::parse("[providers.inter]\npriority = 1\n", FileFormat::Toml).unwrap_err();
        assert!(matches!(err, SettingsError::Config(_)));
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("PIX__PROVIDERS__BRADESCO__BASE_URL", "https://proxy.api.prebanco.com.br");
        std::env::set_var("PIX__PROVIDERS__BRADESCO__AUTH_URL", "https://proxy.api.prebanco.com.br/auth/server/v1.1/token");
        std::env::set_var("PIX__PROVIDERS__BRADESCO__PRIORITY", "4");
        std::env::set_var("PIX__HEALTH__FRESHNESS_SECONDS", "60");

        let settings = Settings::load(None).unwrap();

        std::env::remove_var("PIX__PROVIDERS__BRADESCO__BASE_URL");
        std::env::remove_var("PIX__PROVIDERS__BRADESCO__AUTH_URL");
        std::env::remove_var("PIX__PROVIDERS__BRADESCO__PRIORITY");
        std::env::remove_var("PIX__HEALTH__FRESHNESS_SECONDS");

        let bradesco = &settings.providers["bradesco"];
        assert_eq!(bradesco.priority, 4);
        assert_eq!(bradesco.config.base_url, "https://proxy.api.prebanco.com.br");
        assert_eq!(settings.health.freshness(), Duration::from_secs(60));
    }
}
