//! Banco do Brasil adapter
//!
//! OAuth2 client-credentials with HTTP Basic client authentication.
//! Amounts travel as two-decimal strings (`"100.50"`). There is no distinct
//! dynamic QR endpoint: dynamic codes go through `cobqrcode` with
//! `calendario.expiracao` set.

use crate::http::{BankHttp, Operation, TokenGrant};
use crate::{
    money, AccountType, AuthToken, CallContext, Capability, GetQrCodeRequest, GetTransferRequest,
    PixProvider, ProviderConfig, ProviderCredentials, QrCodeRequest, QrCodeResponse, Result,
    TransactionStatus, TransferRequest, TransferResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Registry code
pub const CODE: &str = "banco_do_brasil";

/// Banco do Brasil ISPB
pub const ISPB: &str = "00000000";

const NAME: &str = "Banco do Brasil";

const SCOPE: &str = "cob.write cob.read pix.write pix.read";

const SUPPORTED: &[Capability] = &[
    Capability::PixKey,
    Capability::Account,
    Capability::Transfer,
    Capability::GetTransfer,
    Capability::QrCodeStatic,
    Capability::QrCodeDynamic,
    Capability::GetQrCode,
];

/// Banco do Brasil
#[derive(Default)]
pub struct BancoDoBrasilProvider {
    http: OnceLock<BankHttp>,
}

impl BancoDoBrasilProvider {
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
        let expiracao = request.expires_in_seconds.filter(|seconds| *seconds > 0);
        let payload = Cobranca {
            valor: CobrancaAmount {
                original: request.amount,
            },
            chave: &request.pix_key,
            solicitacao_pagador: &request.description,
            calendario: expiracao.map(|expiracao| Calendar { expiracao }),
        };

        let outbound = http.post_json(&request.auth, "/pix/v1/cobqrcode", &payload)?;
        let reply = http.execute(ctx, operation, outbound).await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        let created_at = Utc::now();
        Ok(QrCodeResponse {
            qr_code_id: wire.txid,
            qr_code: wire.qrcode,
            qr_code_image: wire.imagem_qrcode.filter(|image| !image.is_empty()),
            amount: request.amount,
            description: request.description.clone(),
            status: wire.status.unwrap_or_else(|| "ATIVA".to_string()),
            expires_at: request.expiry_from(created_at),
            created_at,
            raw_response: raw,
        })
    }
}

/// BB transfer/charge status to canonical
pub fn map_status(status: &str) -> TransactionStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "ATIVA" | "CONCLUIDA" => TransactionStatus::Completed,
        "PENDENTE" | "EM_PROCESSAMENTO" => TransactionStatus::Processing,
        "REMOVIDA_PELO_USUARIO_RECEBEDOR" | "REMOVIDA_PELO_PSP" => TransactionStatus::Cancelled,
        _ => TransactionStatus::Pending,
    }
}

/// Canonical account type to BB vocabulary
pub fn map_account_type(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Checking => "CORRENTE",
        AccountType::Savings => "POUPANCA",
    }
}

#[derive(Serialize)]
struct TokenForm<'a> {
    grant_type: &'a str,
    scope: &'a str,
}

#[derive(Serialize)]
struct PixPayment<'a> {
    #[serde(with = "money::major_units_str")]
    valor: i64,
    chave: &'a str,
    descricao: &'a str,
    txid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    favorecido: Option<Favorecido<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Favorecido<'a> {
    nome: &'a str,
    cpf_cnpj: &'a str,
    banco: &'a str,
    agencia: &'a str,
    conta: &'a str,
    tipo_conta: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PixPaymentReply {
    #[serde(default)]
    end_to_end_id: String,
    #[serde(default)]
    txid: String,
    #[serde(default)]
    status: String,
    #[serde(default, with = "money::major_units_str")]
    valor: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Cobranca<'a> {
    valor: CobrancaAmount,
    chave: &'a str,
    solicitacao_pagador: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    calendario: Option<Calendar>,
}

#[derive(Serialize)]
struct CobrancaAmount {
    #[serde(with = "money::major_units_str")]
    original: i64,
}

#[derive(Serialize)]
struct Calendar {
    expiracao: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrReply {
    #[serde(default)]
    txid: String,
    #[serde(default)]
    qrcode: String,
    #[serde(default)]
    imagem_qrcode: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl PixProvider for BancoDoBrasilProvider {
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
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&TokenForm {
                grant_type: "client_credentials",
                scope: SCOPE,
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
        let payee = &request.payee;

        let favorecido = match (payee.key(), &payee.account) {
            (None, Some(account)) => Some(Favorecido {
                nome: &payee.name,
                cpf_cnpj: &payee.document,
                banco: &account.ispb,
                agencia: &account.agency,
                conta: &account.number,
                tipo_conta: map_account_type(account.account_type),
            }),
            _ => None,
        };

        let txid = if request.external_id.is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            request.external_id.clone()
        };

        let payload = PixPayment {
            valor: request.amount,
            chave: payee.key().unwrap_or_default(),
            descricao: &request.description,
            txid,
            favorecido,
        };

        let outbound = http.post_json(&request.auth, "/pix/v1/pix", &payload)?;
        let reply = http.execute(ctx, Operation::CreateTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PixPaymentReply>()?;

        Ok(TransferResponse {
            provider_tx_id: wire.txid,
            end_to_end_id: wire.end_to_end_id,
            status: map_status(&wire.status),
            amount: if wire.valor > 0 { wire.valor } else { request.amount },
            description: request.description.clone(),
            payee: Some(payee.clone()),
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
        let outbound = http.get_resource(&request.auth, "/pix/v1/pix", &request.provider_tx_id)?;
        let reply = http.execute(ctx, Operation::GetTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PixPaymentReply>()?;

        let status = map_status(&wire.status);
        Ok(TransferResponse {
            provider_tx_id: if wire.txid.is_empty() {
                request.provider_tx_id.clone()
            } else {
                wire.txid
            },
            end_to_end_id: wire.end_to_end_id,
            status,
            amount: wire.valor,
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
        let outbound = http.get_resource(&request.auth, "/pix/v1/cobqrcode", &request.qr_code_id)?;
        let reply = http.execute(ctx, Operation::GetQrCode, outbound).await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        Ok(QrCodeResponse {
            qr_code_id: wire.txid,
            qr_code: wire.qrcode,
            qr_code_image: wire.imagem_qrcode.filter(|image| !image.is_empty()),
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
        let outbound = http.probe_request("/pix/v1/health");

        http.execute(ctx, Operation::HealthCheck, outbound).await?;
        Ok(())
    }

    fn supported_methods(&self) -> &'static [Capability] {
        SUPPORTED
    }
}
