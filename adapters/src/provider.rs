//! Provider contract
//!
//! One capability set implemented by every bank adapter. Adapters are flat,
//! independent implementers: they share plumbing (`http`, `money`) but no
//! base type.
//!
//! # Initialization
//!
//! [`PixProvider::initialize`] must be called once before anything else.
//! Every network-bound method of the built-in adapters fails
//! deterministically with `NOT_INITIALIZED` before that; none of them panic.

use crate::{
    AuthToken, CallContext, CancelTransferRequest, Capability, GetQrCodeRequest,
    GetTransferRequest, ProviderConfig, ProviderCredentials, ProviderError, QrCodeRequest,
    QrCodeResponse, Result, TransferRequest, TransferResponse, ValidatePixKeyRequest,
    ValidatePixKeyResponse,
};
use async_trait::async_trait;

/// Bank adapter contract
#[async_trait]
pub trait PixProvider: Send + Sync {
    /// Stable registry key (`inter`, `itau`, ...)
    fn code(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Bind connection policy. Idempotent for an identical config; a different
    /// config after the first call fails with `CONFIG_ERROR`.
    fn initialize(&self, config: ProviderConfig) -> Result<()>;

    /// OAuth2 handshake. The token is returned, never cached.
    async fn authenticate(
        &self,
        ctx: &CallContext,
        credentials: &ProviderCredentials,
    ) -> Result<AuthToken>;

    /// Exchange a refresh token. `NOT_SUPPORTED` means: authenticate again.
    async fn refresh_token(
        &self,
        _ctx: &CallContext,
        _credentials: &ProviderCredentials,
        _token: &AuthToken,
    ) -> Result<AuthToken> {
        Err(ProviderError::not_supported(self.code(), "refresh_token"))
    }

    /// Submit a transfer
    async fn create_transfer(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
    ) -> Result<TransferResponse>;

    /// Current state of a transfer
    async fn get_transfer(
        &self,
        ctx: &CallContext,
        request: &GetTransferRequest,
    ) -> Result<TransferResponse>;

    /// Reverse a transfer, where the institution has a reversal API
    async fn cancel_transfer(
        &self,
        _ctx: &CallContext,
        _request: &CancelTransferRequest,
    ) -> Result<TransferResponse> {
        Err(ProviderError::not_supported(self.code(), "cancel_transfer"))
    }

    /// Static (reusable) QR code
    async fn create_qr_code_static(
        &self,
        ctx: &CallContext,
        request: &QrCodeRequest,
    ) -> Result<QrCodeResponse>;

    /// Dynamic (single-use, expiring) QR code
    async fn create_qr_code_dynamic(
        &self,
        ctx: &CallContext,
        request: &QrCodeRequest,
    ) -> Result<QrCodeResponse>;

    /// Look up a QR code
    async fn get_qr_code(
        &self,
        ctx: &CallContext,
        request: &GetQrCodeRequest,
    ) -> Result<QrCodeResponse>;

    /// DICT key lookup. `NOT_IMPLEMENTED` when the adapter never offers it.
    async fn validate_pix_key(
        &self,
        _ctx: &CallContext,
        _request: &ValidatePixKeyRequest,
    ) -> Result<ValidatePixKeyResponse> {
        Err(ProviderError::not_implemented(self.code(), "validate_pix_key"))
    }

    /// Liveness probe; needs no token and is bounded by the adapter timeout
    async fn health_check(&self, ctx: &CallContext) -> Result<()>;

    /// Static capability advertisement
    fn supported_methods(&self) -> &'static [Capability];

    /// Whether `capability` is advertised
    fn supports(&self, capability: Capability) -> bool {
        self.supported_methods().contains(&capability)
    }
}
