//! Canonical transfer/QR model shared by every adapter
//!
//! Amounts are always integer minor units (centavos). Conversion to a bank's
//! decimal representation happens inside the adapter, see [`crate::money`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token lifetime assumed when an institution omits `expires_in`
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 300;

/// Canonical transaction status
///
/// `pending → processing → {completed | failed | cancelled} → refunded`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Accepted, not yet picked up
    #[default]
    Pending,
    /// In flight at the institution
    Processing,
    /// Settled
    Completed,
    /// Rejected or errored
    Failed,
    /// Cancelled or returned
    Cancelled,
    /// Refunded after completion
    Refunded,
}

impl TransactionStatus {
    /// All statuses, lifecycle order
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
        TransactionStatus::Refunded,
    ];

    /// Persisted token
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
        }
    }

    /// No further transitions except `completed → refunded`
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::Processing
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PIX key type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixKeyType {
    /// Individual taxpayer id
    #[default]
    Cpf,
    /// Company taxpayer id
    Cnpj,
    /// E-mail address
    Email,
    /// Phone number
    Phone,
    /// Random key (EVP)
    Random,
    /// Agency + account
    Account,
}

impl PixKeyType {
    /// Persisted token
    pub fn as_str(&self) -> &'static str {
        match self {
            PixKeyType::Cpf => "cpf",
            PixKeyType::Cnpj => "cnpj",
            PixKeyType::Email => "email",
            PixKeyType::Phone => "phone",
            PixKeyType::Random => "random",
            PixKeyType::Account => "account",
        }
    }

    /// Parse a persisted token; unknown input falls back to [`PixKeyType::Cpf`]
    pub fn from_code_lossy(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "cnpj" => PixKeyType::Cnpj,
            "email" => PixKeyType::Email,
            "phone" => PixKeyType::Phone,
            "random" | "evp" => PixKeyType::Random,
            "account" => PixKeyType::Account,
            _ => PixKeyType::Cpf,
        }
    }
}

/// Bank account type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Checking account
    #[default]
    Checking,
    /// Savings account
    Savings,
}

impl AccountType {
    /// Persisted token
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }

    /// Parse a persisted token; unknown input falls back to [`AccountType::Checking`]
    pub fn from_code_lossy(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "savings" => AccountType::Savings,
            _ => AccountType::Checking,
        }
    }
}

/// Capability advertised by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Payee addressed by PIX key
    PixKey,
    /// Payee addressed by bank account
    Account,
    /// Create transfer
    Transfer,
    /// Look up transfer
    GetTransfer,
    /// Reverse transfer
    CancelTransfer,
    /// Static QR code
    QrCodeStatic,
    /// Dynamic QR code
    QrCodeDynamic,
    /// Look up QR code
    GetQrCode,
    /// DICT key lookup
    ValidatePixKey,
    /// OAuth2 refresh grant
    RefreshToken,
}

impl Capability {
    /// Advertised token
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::PixKey => "pix_key",
            Capability::Account => "account",
            Capability::Transfer => "transfer",
            Capability::GetTransfer => "get_transfer",
            Capability::CancelTransfer => "cancel_transfer",
            Capability::QrCodeStatic => "qrcode_static",
            Capability::QrCodeDynamic => "qrcode_dynamic",
            Capability::GetQrCode => "get_qrcode",
            Capability::ValidatePixKey => "validate_pix_key",
            Capability::RefreshToken => "refresh_token",
        }
    }
}

fn default_timeout_seconds() -> u64 {
    crate::DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_max_retries() -> u32 {
    crate::DEFAULT_MAX_RETRIES
}

/// Per-adapter connection policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Production API base URL
    pub base_url: String,
    /// OAuth2 token endpoint
    pub auth_url: String,
    /// Sandbox API base URL
    #[serde(default)]
    pub sandbox_url: Option<String>,
    /// Target `sandbox_url` instead of `base_url`
    #[serde(default)]
    pub sandbox: bool,
    /// Per-request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Retry budget for the caller (adapters never retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Client certificate required
    #[serde(default)]
    pub requires_mtls: bool,
}

impl ProviderConfig {
    /// Config with defaults for everything but the endpoints
    pub fn new(base_url: impl Into<String>, auth_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_url: auth_url.into(),
            sandbox_url: None,
            sandbox: false,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            requires_mtls: false,
        }
    }

    /// Base URL requests are sent to (sandbox-aware, no trailing slash)
    pub fn api_base_url(&self) -> &str {
        let url = match (&self.sandbox_url, self.sandbox) {
            (Some(sandbox_url), true) if !sandbox_url.is_empty() => sandbox_url.as_str(),
            _ => self.base_url.as_str(),
        };
        url.trim_end_matches('/')
    }

    /// Per-request timeout
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// mTLS client certificate (PEM)
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    /// Certificate chain, PEM
    pub certificate: Vec<u8>,
    /// Private key, PEM
    pub private_key: Vec<u8>,
}

impl ClientCertificate {
    /// Certificate followed by key, the layout `reqwest::Identity::from_pem` expects
    pub fn identity_pem(&self) -> Vec<u8> {
        let mut pem = Vec::with_capacity(self.certificate.len() + self.private_key.len() + 1);
        pem.extend_from_slice(&self.certificate);
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(&self.private_key);
        pem
    }
}

impl std::fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("certificate", &format_args!("<{} bytes>", self.certificate.len()))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Per-tenant secret material, plaintext only inside call scope
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// mTLS material
    pub certificate: Option<ClientCertificate>,
    /// Account agency
    pub account_agency: String,
    /// Account number
    pub account_number: String,
    /// Account type
    pub account_type: AccountType,
    /// Tenant PIX key
    pub pix_key: Option<String>,
    /// Tenant PIX key type
    pub pix_key_type: Option<PixKeyType>,
}

impl ProviderCredentials {
    /// Client-credentials pair without account data
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Attach mTLS material
    pub fn with_certificate(mut self, certificate: ClientCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Per-call authorisation for operations after `authenticate`
    pub fn call_auth(&self, token: &AuthToken) -> CallAuth {
        CallAuth {
            access_token: token.access_token.clone(),
            client_id: self.client_id.clone(),
            certificate: self.certificate.clone(),
        }
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("certificate", &self.certificate)
            .field("account_agency", &self.account_agency)
            .field("account_number", &self.account_number)
            .field("account_type", &self.account_type)
            .field("pix_key_type", &self.pix_key_type)
            .finish()
    }
}

/// OAuth2 access token issued by an institution
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Access token
    pub access_token: String,
    /// Refresh token, when the institution issues one
    pub refresh_token: Option<String>,
    /// Token type (usually `Bearer`)
    pub token_type: String,
    /// Lifetime declared by the institution
    pub expires_in: i64,
    /// Always populated
    pub expires_at: DateTime<Utc>,
    /// Granted scope
    pub scope: Option<String>,
}

impl AuthToken {
    /// Build from an OAuth2 grant response received now
    pub fn from_grant(
        access_token: String,
        token_type: Option<String>,
        expires_in: Option<i64>,
        refresh_token: Option<String>,
        scope: Option<String>,
    ) -> Self {
        let now = Utc::now();
        // Lifetimes that do not fit a timestamp fall back to the default
        let (expires_in, expires_at) = expires_in
            .filter(|seconds| *seconds > 0)
            .and_then(|seconds| {
                let expires_at = now.checked_add_signed(Duration::try_seconds(seconds)?)?;
                Some((seconds, expires_at))
            })
            .unwrap_or_else(|| {
                (
                    DEFAULT_TOKEN_TTL_SECONDS,
                    now + Duration::seconds(DEFAULT_TOKEN_TTL_SECONDS),
                )
            });

        Self {
            access_token,
            refresh_token: refresh_token.filter(|token| !token.is_empty()),
            token_type: token_type
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expires_in,
            expires_at,
            scope: scope.filter(|scope| !scope.is_empty()),
        }
    }

    /// Expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Expires within `margin` of `now` (refresh-before-expiry check for caches)
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin >= self.expires_at
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Authorisation attached to every post-auth request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallAuth {
    /// Bearer token
    pub access_token: String,
    /// OAuth2 client id (some institutions echo it in a header)
    pub client_id: String,
    /// mTLS material for institutions that require it
    pub certificate: Option<ClientCertificate>,
}

impl CallAuth {
    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for CallAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallAuth")
            .field("access_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("certificate", &self.certificate)
            .finish()
    }
}

/// Bank account identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Agency (branch)
    pub agency: String,
    /// Account number
    pub number: String,
    /// Account type
    pub account_type: AccountType,
    /// Bank code (COMPE)
    pub bank_code: String,
    /// ISPB
    pub ispb: String,
}

/// Payer or payee
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Holder name
    pub name: String,
    /// CPF/CNPJ
    pub document: String,
    /// PIX key
    pub pix_key: Option<String>,
    /// PIX key type
    pub pix_key_type: Option<PixKeyType>,
    /// Account, used when no PIX key is given
    pub account: Option<BankAccount>,
}

impl Party {
    /// PIX key, when present and non-empty
    pub fn key(&self) -> Option<&str> {
        self.pix_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Canonical transfer request
#[derive(Debug, Clone, Default)]
pub struct TransferRequest {
    /// Merchant idempotency key
    pub external_id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Free text
    pub description: String,
    /// Payer
    pub payer: Party,
    /// Payee
    pub payee: Party,
    /// Merchant metadata
    pub metadata: Map<String, Value>,
    /// Authorisation
    pub auth: CallAuth,
}

/// Transfer lookup
#[derive(Debug, Clone, Default)]
pub struct GetTransferRequest {
    /// Institution transaction id
    pub provider_tx_id: String,
    /// Authorisation
    pub auth: CallAuth,
}

/// Transfer reversal
#[derive(Debug, Clone, Default)]
pub struct CancelTransferRequest {
    /// Institution transaction id
    pub provider_tx_id: String,
    /// Reason shown to the payer
    pub reason: String,
    /// Authorisation
    pub auth: CallAuth,
}

/// Canonical transfer response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Institution transaction id
    pub provider_tx_id: String,
    /// PIX end-to-end id
    pub end_to_end_id: String,
    /// Canonical status
    pub status: TransactionStatus,
    /// Amount in minor units
    pub amount: i64,
    /// Free text
    pub description: String,
    /// Payer as reported by the institution
    pub payer: Option<Party>,
    /// Payee as reported by the institution
    pub payee: Option<Party>,
    /// Accepted by the institution
    pub processed_at: Option<DateTime<Utc>>,
    /// Settled
    pub completed_at: Option<DateTime<Utc>>,
    /// Institution rejection code
    pub error_code: Option<String>,
    /// Institution rejection reason
    pub error_message: Option<String>,
    /// Untouched institution payload, kept for audit
    pub raw_response: Value,
}

/// QR code creation request
#[derive(Debug, Clone, Default)]
pub struct QrCodeRequest {
    /// Merchant idempotency key
    pub external_id: String,
    /// Amount in minor units (0 for open-amount static codes)
    pub amount: i64,
    /// Message shown to the payer
    pub description: String,
    /// Receiver name
    pub payee_name: String,
    /// Receiver CPF/CNPJ
    pub payee_document: String,
    /// Receiver PIX key
    pub pix_key: String,
    /// Receiver PIX key type
    pub pix_key_type: PixKeyType,
    /// Lifetime of the code
    pub expires_in_seconds: Option<u32>,
    /// Payer may change the amount
    pub allow_change: bool,
    /// Merchant metadata
    pub metadata: Map<String, Value>,
    /// Authorisation
    pub auth: CallAuth,
}

impl QrCodeRequest {
    /// Expiry instant requested relative to `created_at`
    pub fn expiry_from(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in_seconds
            .filter(|seconds| *seconds > 0)
            .map(|seconds| created_at + Duration::seconds(i64::from(seconds)))
    }
}

/// QR code lookup
#[derive(Debug, Clone, Default)]
pub struct GetQrCodeRequest {
    /// Institution QR code id
    pub qr_code_id: String,
    /// Authorisation
    pub auth: CallAuth,
}

/// Canonical QR code response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrCodeResponse {
    /// Institution QR code id
    pub qr_code_id: String,
    /// Copy-and-paste code
    pub qr_code: String,
    /// Rendered image, base64
    pub qr_code_image: Option<String>,
    /// Amount in minor units
    pub amount: i64,
    /// Message shown to the payer
    pub description: String,
    /// Institution status string, not mapped
    pub status: String,
    /// Expiry, for codes that expire
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Untouched institution payload, kept for audit
    pub raw_response: Value,
}

/// PIX key lookup
#[derive(Debug, Clone, Default)]
pub struct ValidatePixKeyRequest {
    /// Key to look up
    pub pix_key: String,
    /// Key type
    pub pix_key_type: PixKeyType,
    /// Authorisation
    pub auth: CallAuth,
}

/// PIX key lookup result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatePixKeyResponse {
    /// Key exists
    pub valid: bool,
    /// Key
    pub pix_key: String,
    /// Key type
    pub pix_key_type: PixKeyType,
    /// Holder name
    pub name: String,
    /// Holder document (usually masked)
    pub document: String,
    /// Holder bank
    pub bank: String,
    /// Holder bank ISPB
    pub ispb: String,
    /// Holder account type
    pub account_type: Option<AccountType>,
}
