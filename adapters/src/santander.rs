//! Santander adapter
//!
//! Form OAuth2. Amounts are already minor units on the wire, and every API
//! call carries the client id in `X-Application-Key`. Dynamic QR codes go
//! through the static endpoint with an expiry.

use crate::http::{BankHttp, Operation, TokenGrant};
use crate::{
    AuthToken, CallAuth, CallContext, Capability, GetQrCodeRequest, GetTransferRequest, Party,
    PixProvider, ProviderConfig, ProviderCredentials, QrCodeRequest, QrCodeResponse, Result,
    TransactionStatus, TransferRequest, TransferResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Registry code
pub const CODE: &str = "santander";

/// Santander ISPB
pub const ISPB: &str = "90400888";

const NAME: &str = "Santander";

const APPLICATION_KEY: &str = "X-Application-Key";

const SUPPORTED: &[Capability] = &[
    Capability::PixKey,
    Capability::Transfer,
    Capability::GetTransfer,
    Capability::QrCodeStatic,
    Capability::QrCodeDynamic,
    Capability::GetQrCode,
];

/// Santander
#[derive(Default)]
pub struct SantanderProvider {
    http: OnceLock<BankHttp>,
}

impl SantanderProvider {
    /// Uninitialized adapter
    pub fn new() -> Self {
        Self::default()
    }

    fn http(&self) -> Result<&BankHttp> {
        BankHttp::bound(&self.http, CODE)
    }

    async fn create_qr_code(
        &self,
        ctx: &CallContext,
        request: &QrCodeRequest,
        operation: Operation,
    ) -> Result<QrCodeResponse> {
        let http = self.http()?;
        let payload = StaticQr {
            amount: request.amount,
            pix_key: &request.pix_key,
            description: &request.description,
            expires_in: request.expires_in_seconds.filter(|seconds| *seconds > 0),
        };

        let outbound = with_application_key(
            http.post_json(&request.auth, "/pix/v1/qrcodes/static", &payload)?,
            &request.auth,
        );
        let reply = http.execute(ctx, operation, outbound).await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        let created_at = Utc::now();
        Ok(QrCodeResponse {
            qr_code_id: wire.qrcode_id,
            qr_code: wire.qrcode,
            qr_code_image: wire.image.filter(|image| !image.is_empty()),
            amount: request.amount,
            description: request.description.clone(),
            status: wire.status.unwrap_or_else(|| "ACTIVE".to_string()),
            expires_at: request.expiry_from(created_at),
            created_at,
            raw_response: raw,
        })
    }
}

/// Santander payment status to canonical
pub fn map_status(status: &str) -> TransactionStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "COMPLETED" | "SETTLED" => TransactionStatus::Completed,
        "PROCESSING" | "PENDING" => TransactionStatus::Processing,
        "CANCELLED" | "REJECTED" => TransactionStatus::Cancelled,
        "FAILED" => TransactionStatus::Failed,
        _ => TransactionStatus::Pending,
    }
}

fn with_application_key(request: RequestBuilder, auth: &CallAuth) -> RequestBuilder {
    request.header(APPLICATION_KEY, auth.client_id.as_str())
}

#[derive(Serialize)]
struct TokenForm<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payment<'a> {
    amount: Amount,
    payee: Payee<'a>,
    description: &'a str,
    external_id: &'a str,
}

#[derive(Serialize, Deserialize)]
struct Amount {
    value: i64,
    #[serde(default)]
    currency: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payee<'a> {
    name: &'a str,
    document: &'a str,
    pix_key: &'a str,
}

impl<'a> Payee<'a> {
    fn from_party(party: &'a Party) -> Self {
        Payee {
            name: &party.name,
            document: &party.document,
            pix_key: party.key().unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentReply {
    #[serde(default)]
    transaction_id: String,
    #[serde(default)]
    end_to_end_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount: Option<Amount>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StaticQr<'a> {
    amount: i64,
    pix_key: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrReply {
    #[serde(default)]
    qrcode_id: String,
    #[serde(default)]
    qrcode: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl PixProvider for SantanderProvider {
    fn code(&self) -> &str {
        CODE
    }

    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&self, config: ProviderConfig) -> Result<()> {
        BankHttp::initialize(&self.http, CODE, config)
    }

    async fn authenticate(
        &self,
        ctx: &CallContext,
        credentials: &ProviderCredentials,
    ) -> Result<AuthToken> {
        let http = self.http()?;
        let request = http
            .token_request(credentials.certificate.as_ref())?
            .form(&TokenForm {
                grant_type: "client_credentials",
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
            });

        let reply = http.execute(ctx, Operation::Authenticate, request).await?;
        let (grant, _) = reply.decode::<TokenGrant>()?;
        Ok(grant.into_token())
    }

    async fn create_transfer(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
    ) -> Result<TransferResponse> {
        let http = self.http()?;
        let payload = Payment {
            amount: Amount {
                value: request.amount,
                currency: "BRL".to_string(),
            },
            payee: Payee::from_party(&request.payee),
            description: &request.description,
            external_id: &request.external_id,
        };

        let outbound = with_application_key(
            http.post_json(&request.auth, "/pix/v1/payments", &payload)?,
            &request.auth,
        );
        let reply = http.execute(ctx, Operation::CreateTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PaymentReply>()?;

        Ok(TransferResponse {
            provider_tx_id: wire.transaction_id,
            end_to_end_id: wire.end_to_end_id,
            status: map_status(&wire.status),
            amount: request.amount,
            description: request.description.clone(),
            payee: Some(request.payee.clone()),
            processed_at: Some(Utc::now()),
            raw_response: raw,
            ..Default::default()
        })
    }

    async fn get_transfer(
        &self,
        ctx: &CallContext,
        request: &GetTransferRequest,
    ) -> Result<TransferResponse> {
        let http = self.http()?;
        let outbound = with_application_key(
            http.get_resource(&request.auth, "/pix/v1/payments", &request.provider_tx_id)?,
            &request.auth,
        );
        let reply = http.execute(ctx, Operation::GetTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PaymentReply>()?;

        Ok(TransferResponse {
            provider_tx_id: if wire.transaction_id.is_empty() {
                request.provider_tx_id.clone()
            } else {
                wire.transaction_id
            },
            end_to_end_id: wire.end_to_end_id,
            status: map_status(&wire.status),
            amount: wire.amount.map(|amount| amount.value).unwrap_or_default(),
            raw_response: raw,
            ..Default::default()
        })
    }

    async fn create_qr_code_static(
        &self,
        ctx: &CallContext,
        request: &QrCodeRequest,
    ) -> Result<QrCodeResponse> {
        self.create_qr_code(ctx, request, Operation::CreateQrCodeStatic)
            .await
    }

    async fn create_qr_code_dynamic(
        &self,
        ctx: &CallContext,
        request: &QrCodeRequest,
    ) -> Result<QrCodeResponse> {
        self.create_qr_code(ctx, request, Operation::CreateQrCodeDynamic)
            .await
    }

    async fn get_qr_code(
        &self,
        ctx: &CallContext,
        request: &GetQrCodeRequest,
    ) -> Result<QrCodeResponse> {
        let http = self.http()?;
        let outbound = with_application_key(
            http.get_resource(&request.auth, "/pix/v1/qrcodes", &request.qr_code_id)?,
            &request.auth,
        );
        let reply = http.execute(ctx, Operation::GetQrCode, outbound).await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        Ok(QrCodeResponse {
            qr_code_id: wire.qrcode_id,
            qr_code: wire.qrcode,
            qr_code_image: wire.image.filter(|image| !image.is_empty()),
            amount: 0,
            description: String::new(),
            status: wire.status.unwrap_or_default(),
            expires_at: None,
            created_at: Utc::now(),
            raw_response: raw,
        })
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<()> {
        let http = self.http()?;
        let outbound = http.probe_request("/health");

        http.execute(ctx, Operation::HealthCheck, outbound).await?;
        Ok(())
    }

    fn supported_methods(&self) -> &'static [Capability] {
        SUPPORTED
    }
}
