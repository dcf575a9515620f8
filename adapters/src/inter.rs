//! Banco Inter adapter
//!
//! Form-encoded client-credentials OAuth2 with scope, Banking API v2.
//! Amounts travel as JSON decimal numbers.

use crate::http::{BankHttp, Operation, TokenGrant};
use crate::{
    money, AccountType, AuthToken, CallContext, Capability, GetQrCodeRequest, GetTransferRequest,
    Party, PixProvider, ProviderConfig, ProviderCredentials, QrCodeRequest, QrCodeResponse,
    Result, TransactionStatus, TransferRequest, TransferResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Registry code
pub const CODE: &str = "inter";

/// Banco Inter ISPB
pub const ISPB: &str = "00416968";

const NAME: &str = "Banco Inter";

const SCOPE: &str =
    "extrato.read boleto-cobranca.read boleto-cobranca.write pagamento-pix.write pagamento-pix.read";

const SUPPORTED: &[Capability] = &[
    Capability::PixKey,
    Capability::Account,
    Capability::Transfer,
    Capability::GetTransfer,
    Capability::QrCodeStatic,
    Capability::QrCodeDynamic,
    Capability::GetQrCode,
];

/// Banco Inter
#[derive(Default)]
pub struct InterProvider {
    http: OnceLock<BankHttp>,
}

impl InterProvider {
    /// Uninitialized adapter
    pub fn new() -> Self {
        Self::default()
    }

    fn http(&self) -> Result<&BankHttp> {
        BankHttp::bound(&self.http, CODE)
    }
}

/// Inter transfer status to canonical
pub fn map_status(status: &str) -> TransactionStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "REALIZADO" | "CONCLUIDO" => TransactionStatus::Completed,
        "EM_PROCESSAMENTO" | "PENDENTE" => TransactionStatus::Processing,
        "CANCELADO" | "DEVOLVIDO" => TransactionStatus::Cancelled,
        "ERRO" | "REJEITADO" => TransactionStatus::Failed,
        _ => TransactionStatus::Pending,
    }
}

fn account_type(kind: AccountType) -> &'static str {
    match kind {
        AccountType::Checking => "CONTA_CORRENTE",
        AccountType::Savings => "CONTA_POUPANCA",
    }
}

#[derive(Serialize)]
struct TokenForm<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
    grant_type: &'a str,
}

#[derive(Serialize)]
struct PixPayment<'a> {
    #[serde(with = "money::major_units")]
    valor: i64,
    destinatario: Recipient<'a>,
    #[serde(skip_serializing_if = "str::is_empty")]
    descricao: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    tipo: &'static str,
    nome: &'a str,
    cpf_cnpj: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chave: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agencia: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conta_corrente: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo_conta: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ispb: Option<&'a str>,
}

impl<'a> Recipient<'a> {
    fn from_party(party: &'a Party) -> Self {
        let mut recipient = Recipient {
            tipo: "CHAVE",
            nome: &party.name,
            cpf_cnpj: &party.document,
            chave: None,
            agencia: None,
            conta_corrente: None,
            tipo_conta: None,
            ispb: None,
        };

        match (party.key(), &party.account) {
            (Some(key), _) => recipient.chave = Some(key),
            (None, Some(account)) => {
                recipient.tipo = "DADOS_BANCARIOS";
                recipient.agencia = Some(&account.agency);
                recipient.conta_corrente = Some(&account.number);
                recipient.tipo_conta = Some(account_type(account.account_type));
                recipient.ispb = Some(&account.ispb);
            }
            (None, None) => {}
        }

        recipient
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PixPaymentReply {
    #[serde(default)]
    codigo_solicitacao: String,
    #[serde(default)]
    end_to_end_id: String,
    #[serde(default)]
    status: String,
    #[serde(default, with = "money::major_units")]
    valor: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StaticQr<'a> {
    #[serde(with = "money::major_units")]
    valor: i64,
    chave: &'a str,
    solicitacao_pagador: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DynamicQr<'a> {
    valor: DynamicAmount,
    chave: &'a str,
    solicitacao_pagador: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    calendario: Option<Calendar>,
}

#[derive(Serialize)]
struct DynamicAmount {
    #[serde(with = "money::major_units")]
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
    pix_copia_e_cola: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl PixProvider for InterProvider {
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
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
                scope: SCOPE,
                grant_type: "client_credentials",
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
        let payload = PixPayment {
            valor: request.amount,
            destinatario: Recipient::from_party(&request.payee),
            descricao: &request.description,
        };

        let outbound = http.post_json(&request.auth, "/banking/v2/pix", &payload)?;
        let reply = http.execute(ctx, Operation::CreateTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PixPaymentReply>()?;

        Ok(TransferResponse {
            provider_tx_id: wire.codigo_solicitacao,
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
        let outbound =
            http.get_resource(&request.auth, "/banking/v2/pix", &request.provider_tx_id)?;
        let reply = http.execute(ctx, Operation::GetTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PixPaymentReply>()?;

        let provider_tx_id = if wire.codigo_solicitacao.is_empty() {
            request.provider_tx_id.clone()
        } else {
            wire.codigo_solicitacao
        };

        Ok(TransferResponse {
            provider_tx_id,
            end_to_end_id: wire.end_to_end_id,
            status: map_status(&wire.status),
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
        let http = self.http()?;
        let payload = StaticQr {
            valor: request.amount,
            chave: &request.pix_key,
            solicitacao_pagador: &request.description,
        };

        let outbound = http.post_json(&request.auth, "/banking/v2/pix/qrcode-estatico", &payload)?;
        let reply = http
            .execute(ctx, Operation::CreateQrCodeStatic, outbound)
            .await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        Ok(qr_response(wire, raw, request, None, Utc::now()))
    }

    async fn create_qr_code_dynamic(
        &self,
        ctx: &CallContext,
        request: &QrCodeRequest,
    ) -> Result<QrCodeResponse> {
        let http = self.http()?;
        let payload = DynamicQr {
            valor: DynamicAmount {
                original: request.amount,
            },
            chave: &request.pix_key,
            solicitacao_pagador: &request.description,
            calendario: request
                .expires_in_seconds
                .filter(|seconds| *seconds > 0)
                .map(|expiracao| Calendar { expiracao }),
        };

        let outbound = http.post_json(&request.auth, "/banking/v2/pix/qrcode-dinamico", &payload)?;
        let reply = http
            .execute(ctx, Operation::CreateQrCodeDynamic, outbound)
            .await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        let created_at = Utc::now();
        Ok(qr_response(
            wire,
            raw,
            request,
            request.expiry_from(created_at),
            created_at,
        ))
    }

    async fn get_qr_code(
        &self,
        ctx: &CallContext,
        request: &GetQrCodeRequest,
    ) -> Result<QrCodeResponse> {
        let http = self.http()?;
        let outbound =
            http.get_resource(&request.auth, "/banking/v2/pix/qrcode", &request.qr_code_id)?;
        let reply = http.execute(ctx, Operation::GetQrCode, outbound).await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        Ok(QrCodeResponse {
            qr_code_id: wire.txid,
            qr_code: wire.pix_copia_e_cola,
            qr_code_image: None,
            amount: 0,
            description: String::new(),
            status: wire.status,
            expires_at: None,
            created_at: Utc::now(),
            raw_response: raw,
        })
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<()> {
        // No public health endpoint
        self.http()?.probe_base_url(ctx).await
    }

    fn supported_methods(&self) -> &'static [Capability] {
        SUPPORTED
    }
}

fn qr_response(
    wire: QrReply,
    raw: serde_json::Value,
    request: &QrCodeRequest,
    expires_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
) -> QrCodeResponse {
    QrCodeResponse {
        qr_code_id: wire.txid,
        qr_code: wire.pix_copia_e_cola,
        qr_code_image: None,
        amount: request.amount,
        description: request.description.clone(),
        status: if wire.status.is_empty() {
            "ATIVA".to_string()
        } else {
            wire.status
        },
        expires_at,
        created_at,
        raw_response: raw,
    }
}
