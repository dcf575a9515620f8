//! Outbound HTTP plumbing shared by the bank adapters
//!
//! Owns the per-adapter `reqwest` client, mTLS identity handling, and the
//! mapping of transport failures and institution rejections into
//! [`ProviderError`].

use crate::{
    error::is_retryable_status, metrics, AuthToken, CallAuth, CallContext, ClientCertificate,
    ErrorCode, ProviderConfig, ProviderError, Result,
};
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Identity, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Provider operation, used for error classification and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Authenticate,
    RefreshToken,
    CreateTransfer,
    GetTransfer,
    CancelTransfer,
    CreateQrCodeStatic,
    CreateQrCodeDynamic,
    GetQrCode,
    ValidatePixKey,
    HealthCheck,
}

impl Operation {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Operation::Authenticate => "authenticate",
            Operation::RefreshToken => "refresh_token",
            Operation::CreateTransfer => "create_transfer",
            Operation::GetTransfer => "get_transfer",
            Operation::CancelTransfer => "cancel_transfer",
            Operation::CreateQrCodeStatic => "create_qr_code_static",
            Operation::CreateQrCodeDynamic => "create_qr_code_dynamic",
            Operation::GetQrCode => "get_qr_code",
            Operation::ValidatePixKey => "validate_pix_key",
            Operation::HealthCheck => "health_check",
        }
    }

    /// Code when the institution answered with an error status
    fn rejected_code(&self) -> ErrorCode {
        match self {
            Operation::Authenticate | Operation::RefreshToken => ErrorCode::AuthFailed,
            Operation::CreateTransfer | Operation::CancelTransfer => ErrorCode::TransferFailed,
            Operation::GetTransfer => ErrorCode::QueryFailed,
            Operation::CreateQrCodeStatic
            | Operation::CreateQrCodeDynamic
            | Operation::GetQrCode => ErrorCode::QrCodeFailed,
            Operation::ValidatePixKey => ErrorCode::KeyLookupFailed,
            Operation::HealthCheck => ErrorCode::HealthCheckFailed,
        }
    }

    /// Code when the institution could not be reached
    fn transport_code(&self) -> ErrorCode {
        match self {
            Operation::Authenticate | Operation::RefreshToken => ErrorCode::AuthError,
            Operation::CreateTransfer | Operation::CancelTransfer => ErrorCode::TransferError,
            Operation::GetTransfer => ErrorCode::QueryError,
            Operation::CreateQrCodeStatic
            | Operation::CreateQrCodeDynamic
            | Operation::GetQrCode => ErrorCode::QrCodeError,
            Operation::ValidatePixKey => ErrorCode::KeyLookupError,
            Operation::HealthCheck => ErrorCode::HealthCheckFailed,
        }
    }

    fn is_lookup(&self) -> bool {
        matches!(
            self,
            Operation::GetTransfer | Operation::GetQrCode | Operation::ValidatePixKey
        )
    }
}

/// Successful institution response
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub(crate) status: u16,
    pub(crate) body: Bytes,
}

impl Reply {
    /// Decode into the adapter's wire type, keeping the raw payload for audit
    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<(T, Value)> {
        let raw: Value = serde_json::from_slice(&self.body)
            .map_err(|e| ProviderError::parse(e).with_status(self.status))?;
        let typed = T::deserialize(&raw).map_err(|e| {
            ProviderError::parse(e)
                .with_status(self.status)
                .with_detail("response", raw.clone())
        })?;

        Ok((typed, raw))
    }
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenGrant {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenGrant {
    pub(crate) fn into_token(self) -> AuthToken {
        AuthToken::from_grant(
            self.access_token,
            self.token_type,
            self.expires_in,
            self.refresh_token,
            self.scope,
        )
    }
}

/// Transport bound to one adapter by `initialize`
pub(crate) struct BankHttp {
    provider: &'static str,
    config: ProviderConfig,
    client: Client,
}

impl BankHttp {
    fn new(provider: &'static str, config: ProviderConfig) -> Result<Self> {
        for (field, value) in [
            ("base_url", config.api_base_url()),
            ("auth_url", config.auth_url.as_str()),
        ] {
            Url::parse(value).map_err(|e| {
                ProviderError::new(
                    ErrorCode::ConfigError,
                    format!("Invalid {} for {}: {}", field, provider, e),
                )
                .with_detail("provider", provider)
            })?;
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ProviderError::new(ErrorCode::ConfigError, format!("HTTP client: {}", e))
                    .with_detail("provider", provider)
            })?;

        Ok(Self {
            provider,
            config,
            client,
        })
    }

    /// Bind `config` into `slot`. Re-binding the identical config is a no-op;
    /// a different one is rejected because the adapter is already live.
    pub(crate) fn initialize(
        slot: &OnceLock<BankHttp>,
        provider: &'static str,
        config: ProviderConfig,
    ) -> Result<()> {
        if let Some(existing) = slot.get() {
            return existing.ensure_same(&config);
        }

        let http = Self::new(provider, config.clone())?;
        match slot.set(http) {
            Ok(()) => {
                info!(
                    provider,
                    base_url = config.api_base_url(),
                    sandbox = config.sandbox,
                    mtls = config.requires_mtls,
                    "Provider initialized"
                );
                Ok(())
            }
            // Lost a race with a concurrent initialize
            Err(_) => match slot.get() {
                Some(existing) => existing.ensure_same(&config),
                None => Err(ProviderError::not_initialized(provider)),
            },
        }
    }

    /// Transport bound by `initialize`, or `NOT_INITIALIZED`
    pub(crate) fn bound<'a>(slot: &'a OnceLock<BankHttp>, provider: &str) -> Result<&'a BankHttp> {
        slot.get()
            .ok_or_else(|| ProviderError::not_initialized(provider))
    }

    fn ensure_same(&self, config: &ProviderConfig) -> Result<()> {
        if &self.config == config {
            return Ok(());
        }

        Err(ProviderError::new(
            ErrorCode::ConfigError,
            format!("{} already initialized with a different config", self.provider),
        )
        .with_detail("provider", self.provider))
    }

    pub(crate) fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Absolute API URL for `path`
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url(), path)
    }

    /// `collection` URL with `id` appended as one percent-encoded segment
    pub(crate) fn resource_url(&self, collection: &str, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(collection)).map_err(|e| {
            ProviderError::new(ErrorCode::ConfigError, format!("Invalid URL: {}", e))
                .with_detail("provider", self.provider)
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::new(
                    ErrorCode::ConfigError,
                    format!("{} base URL cannot carry a path", self.provider),
                )
                .with_detail("provider", self.provider)
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    /// Client for one call. With `requires_mtls` a dedicated client carrying
    /// the caller's identity is built; the certificate is never cached.
    pub(crate) fn client(&self, certificate: Option<&ClientCertificate>) -> Result<Client> {
        if !self.config.requires_mtls {
            return Ok(self.client.clone());
        }

        let certificate = certificate.ok_or_else(|| {
            ProviderError::cert(format!("{} requires a client certificate", self.provider))
                .with_detail("provider", self.provider)
        })?;

        let identity = Identity::from_pem(&certificate.identity_pem()).map_err(|e| {
            ProviderError::cert(format!("Invalid client certificate: {}", e))
                .with_detail("provider", self.provider)
        })?;

        Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| {
                ProviderError::cert(format!("mTLS client: {}", e))
                    .with_detail("provider", self.provider)
            })
    }

    /// POST to the token endpoint
    pub(crate) fn token_request(
        &self,
        certificate: Option<&ClientCertificate>,
    ) -> Result<RequestBuilder> {
        Ok(self.client(certificate)?.post(&self.config.auth_url))
    }

    /// Authorised GET of `collection/{id}`
    pub(crate) fn get_resource(
        &self,
        auth: &CallAuth,
        collection: &str,
        id: &str,
    ) -> Result<RequestBuilder> {
        let url = self.resource_url(collection, id)?;
        Ok(self
            .client(auth.certificate.as_ref())?
            .get(url)
            .header(AUTHORIZATION, auth.bearer()))
    }

    /// Unauthenticated GET for liveness probes. Uses the shared client even
    /// under `requires_mtls`: probes carry no caller material.
    pub(crate) fn probe_request(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    /// Authorised POST with a JSON body
    pub(crate) fn post_json<T: Serialize>(
        &self,
        auth: &CallAuth,
        path: &str,
        body: &T,
    ) -> Result<RequestBuilder> {
        let request = self
            .client(auth.certificate.as_ref())?
            .post(self.url(path))
            .header(AUTHORIZATION, auth.bearer());
        json_body(request, body)
    }

    /// Send and require a 2xx answer
    pub(crate) async fn execute(
        &self,
        ctx: &CallContext,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<Reply> {
        let started = Instant::now();
        debug!(provider = self.provider, operation = operation.label(), "Sending request");

        let result = ctx
            .run(operation.label(), self.send(operation, request))
            .await
            .map_err(|e| e.with_detail("provider", self.provider));

        metrics::observe_request(self.provider, operation.label(), &result, started.elapsed());
        if let Err(e) = &result {
            warn!(
                provider = self.provider,
                operation = operation.label(),
                code = e.code.as_str(),
                status = e.status_code,
                retryable = e.retryable,
                "Provider request failed"
            );
        }
        result
    }

    /// Send and return the status of whatever answered; only transport
    /// failures are errors
    pub(crate) async fn probe(
        &self,
        ctx: &CallContext,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<u16> {
        let started = Instant::now();

        let result = ctx
            .run(operation.label(), async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| self.transport_error(operation, e))?;
                Ok(response.status().as_u16())
            })
            .await
            .map_err(|e| e.with_detail("provider", self.provider));

        metrics::observe_request(self.provider, operation.label(), &result, started.elapsed());
        result
    }

    /// Liveness for institutions without a health endpoint: anything below
    /// 500 on the API base URL counts as alive
    pub(crate) async fn probe_base_url(&self, ctx: &CallContext) -> Result<()> {
        let request = self.probe_request("");
        let status = self.probe(ctx, Operation::HealthCheck, request).await?;

        if status >= 500 {
            return Err(ProviderError::new(
                ErrorCode::HealthCheckFailed,
                format!("{} answered HTTP {}", self.provider, status),
            )
            .with_status(status)
            .with_detail("provider", self.provider)
            .retryable());
        }
        Ok(())
    }

    async fn send(&self, operation: Operation, request: RequestBuilder) -> Result<Reply> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if status.is_success() {
            Ok(Reply {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(self.rejection(operation, status.as_u16(), &body))
        }
    }

    fn transport_error(&self, operation: Operation, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            return ProviderError::timeout(operation.label()).with_detail("error", error.to_string());
        }

        if error.is_builder() {
            return ProviderError::new(
                ErrorCode::ConfigError,
                format!("Invalid {} request", operation.label()),
            )
            .with_detail("error", error.to_string());
        }

        ProviderError::new(
            operation.transport_code(),
            format!("{} {} request failed", self.provider, operation.label()),
        )
        .retryable()
        .with_detail("error", error.to_string())
    }

    fn rejection(&self, operation: Operation, status: u16, body: &[u8]) -> ProviderError {
        let code = if status == 404 && operation.is_lookup() {
            ErrorCode::NotFound
        } else {
            operation.rejected_code()
        };

        let mut message = format!(
            "{} rejected {} with HTTP {}",
            self.provider,
            operation.label(),
            status
        );

        let mut error = ProviderError::new(code, String::new()).with_status(status);
        if is_retryable_status(status) {
            error = error.retryable();
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(parsed) => {
                if let Some(bank_code) = pick(&parsed, &["codigo", "code", "error", "title"]) {
                    error = error.with_detail("bank_code", bank_code);
                }
                if let Some(bank_message) =
                    pick(&parsed, &["mensagem", "message", "error_description", "detail"])
                {
                    message = format!("{}: {}", message, bank_message);
                }
                error = error.with_detail("response", parsed);
            }
            Err(_) => {
                error = error.with_detail("response", String::from_utf8_lossy(body).into_owned());
            }
        }

        error.message = message;
        error
    }
}

/// Attach a JSON body, surfacing encode failures as `MARSHAL_ERROR`
pub(crate) fn json_body<T: Serialize>(request: RequestBuilder, body: &T) -> Result<RequestBuilder> {
    let bytes = serde_json::to_vec(body).map_err(ProviderError::marshal)?;
    Ok(request.header(CONTENT_TYPE, "application/json").body(bytes))
}

/// First string-ish value under any of `keys`
fn pick(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}
