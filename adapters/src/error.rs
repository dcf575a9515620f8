//! Error types for providers
//!
//! Every failure that crosses the [`PixProvider`](crate::PixProvider)
//! boundary is a [`ProviderError`], so callers can branch on
//! [`ProviderError::retryable`] without knowing which bank answered.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Institution rejected the auth handshake
    AuthFailed,
    /// Auth handshake could not reach the institution
    AuthError,
    /// Institution rejected the transfer
    TransferFailed,
    /// Transfer request could not reach the institution
    TransferError,
    /// Institution rejected a lookup
    QueryFailed,
    /// Lookup could not reach the institution
    QueryError,
    /// Institution rejected a QR code operation
    #[serde(rename = "QRCODE_FAILED")]
    QrCodeFailed,
    /// QR code operation could not reach the institution
    #[serde(rename = "QRCODE_ERROR")]
    QrCodeError,
    /// Institution rejected a PIX key lookup
    KeyLookupFailed,
    /// PIX key lookup could not reach the institution
    KeyLookupError,
    /// Resource does not exist at the institution
    NotFound,
    /// Institution payload could not be decoded
    ParseError,
    /// Request payload could not be encoded
    MarshalError,
    /// Capability not available on this call path
    NotSupported,
    /// Capability never available on this adapter
    NotImplemented,
    /// Liveness probe failed
    HealthCheckFailed,
    /// mTLS material missing or invalid
    CertError,
    /// Deadline or client timeout expired
    Timeout,
    /// Caller cancelled the call
    Cancelled,
    /// Adapter used before `initialize`
    NotInitialized,
    /// Invalid connection policy
    ConfigError,
    /// No healthy provider could serve the request
    ProviderUnavailable,
}

impl ErrorCode {
    /// Wire token for this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::TransferFailed => "TRANSFER_FAILED",
            ErrorCode::TransferError => "TRANSFER_ERROR",
            ErrorCode::QueryFailed => "QUERY_FAILED",
            ErrorCode::QueryError => "QUERY_ERROR",
            ErrorCode::QrCodeFailed => "QRCODE_FAILED",
            ErrorCode::QrCodeError => "QRCODE_ERROR",
            ErrorCode::KeyLookupFailed => "KEY_LOOKUP_FAILED",
            ErrorCode::KeyLookupError => "KEY_LOOKUP_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::MarshalError => "MARSHAL_ERROR",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::HealthCheckFailed => "HEALTH_CHECK_FAILED",
            ErrorCode::CertError => "CERT_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified provider error
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ProviderError {
    /// Machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Originating HTTP status (0 when not HTTP-sourced)
    pub status_code: u16,
    /// Whether the same request may succeed if attempted again
    pub retryable: bool,
    /// Free-form details (bank response body, transport error, ...)
    pub details: Map<String, Value>,
}

impl ProviderError {
    /// New non-retryable error without HTTP status
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: 0,
            retryable: false,
            details: Map::new(),
        }
    }

    /// Mark as retryable
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Attach originating HTTP status
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Attach a detail entry
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Operation absent on this call path; re-authenticate or use another path
    pub fn not_supported(provider: &str, operation: &str) -> Self {
        Self::new(
            ErrorCode::NotSupported,
            format!("{} is not supported by {}", operation, provider),
        )
        .with_detail("provider", provider)
    }

    /// Capability never available on this adapter
    pub fn not_implemented(provider: &str, operation: &str) -> Self {
        Self::new(
            ErrorCode::NotImplemented,
            format!("{} is not implemented by {}", operation, provider),
        )
        .with_detail("provider", provider)
    }

    /// Adapter used before `initialize`
    pub fn not_initialized(provider: &str) -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            format!("Provider {} used before initialize", provider),
        )
        .with_detail("provider", provider)
    }

    /// Deadline expired
    pub fn timeout(operation: &str) -> Self {
        Self::new(ErrorCode::Timeout, format!("Timeout: {}", operation)).retryable()
    }

    /// Caller cancelled
    pub fn cancelled(operation: &str) -> Self {
        Self::new(ErrorCode::Cancelled, format!("Cancelled: {}", operation)).retryable()
    }

    /// Invalid or missing mTLS material
    pub fn cert(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CertError, message)
    }

    /// Institution payload could not be decoded
    pub fn parse(error: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::ParseError, "Failed to decode institution response")
            .with_detail("error", error.to_string())
    }

    /// Request payload could not be encoded
    pub fn marshal(error: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::MarshalError, "Failed to encode request payload")
            .with_detail("error", error.to_string())
    }

    /// Whether this error came from an HTTP response
    pub fn is_http(&self) -> bool {
        self.status_code != 0
    }

    /// Rejected by the institution because of the request itself (4xx, not retryable)
    pub fn is_client_error(&self) -> bool {
        !self.retryable && (400..500).contains(&self.status_code)
    }

    /// Caller should re-authenticate from scratch or pick another call path
    pub fn is_not_supported(&self) -> bool {
        self.code == ErrorCode::NotSupported
    }
}

/// Whether an HTTP status from an institution is worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_tokens_match_serde() {
        for code in [
            ErrorCode::AuthFailed,
            ErrorCode::QrCodeFailed,
            ErrorCode::QrCodeError,
            ErrorCode::HealthCheckFailed,
            ErrorCode::NotImplemented,
            ErrorCode::ProviderUnavailable,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn test_builder_and_display() {
        let err = ProviderError::new(ErrorCode::TransferFailed, "Transfer rejected")
            .with_status(422)
            .with_detail("bank_code", "SALDO_INSUFICIENTE");

        assert_eq!(err.to_string(), "[TRANSFER_FAILED] Transfer rejected");
        assert!(err.is_http());
        assert!(err.is_client_error());
        assert!(!err.retryable);
        assert_eq!(err.details["bank_code"], "SALDO_INSUFICIENTE");
    }

    #[test]
    fn test_timeout_and_cancel_are_retryable() {
        assert!(ProviderError::timeout("create_transfer").retryable);
        assert!(ProviderError::cancelled("create_transfer").retryable);
        assert!(!ProviderError::parse("eof").retryable);
        assert!(!ProviderError::not_supported("inter", "cancel_transfer").retryable);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(408));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(422));
    }
}
