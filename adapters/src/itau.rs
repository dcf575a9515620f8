//! Itaú Unibanco adapter
//!
//! JSON-body OAuth2 (scope `sispag`), optionally over mTLS. SISPAG payment
//! and QR code APIs with decimal major-unit amounts, plus DICT key lookup.

use crate::http::{json_body, BankHttp, Operation, TokenGrant};
use crate::{
    money, AccountType, AuthToken, BankAccount, CallContext, Capability, ErrorCode,
    GetQrCodeRequest, GetTransferRequest, Party, PixKeyType, PixProvider, ProviderConfig,
    ProviderCredentials, QrCodeRequest, QrCodeResponse, Result, TransactionStatus,
    TransferRequest, TransferResponse, ValidatePixKeyRequest, ValidatePixKeyResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// Registry code
pub const CODE: &str = "itau";

/// Itaú ISPB
pub const ISPB: &str = "60701190";

const NAME: &str = "Itaú Unibanco";

const SCOPE: &str = "sispag";

const SUPPORTED: &[Capability] = &[
    Capability::PixKey,
    Capability::Account,
    Capability::Transfer,
    Capability::GetTransfer,
    Capability::QrCodeStatic,
    Capability::QrCodeDynamic,
    Capability::GetQrCode,
    Capability::ValidatePixKey,
];

/// Itaú Unibanco
#[derive(Default)]
pub struct ItauProvider {
    http: OnceLock<BankHttp>,
}

impl ItauProvider {
    /// Uninitialized adapter
    pub fn new() -> Self {
        Self::default()
    }

    fn http(&self) -> Result<&BankHttp> {
        BankHttp::bound(&self.http, CODE)
    }
}

/// SISPAG payment status to canonical
pub fn map_status(status: &str) -> TransactionStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "PROCESSANDO" | "AGENDADO" => TransactionStatus::Processing,
        "LIQUIDADO" | "CONCLUIDO" => TransactionStatus::Completed,
        "REJEITADO" | "ERRO" => TransactionStatus::Failed,
        "CANCELADO" => TransactionStatus::Cancelled,
        _ => TransactionStatus::Pending,
    }
}

/// Canonical key type to SISPAG vocabulary
pub fn map_key_type(key_type: PixKeyType) -> &'static str {
    match key_type {
        PixKeyType::Cpf => "CPF",
        PixKeyType::Cnpj => "CNPJ",
        PixKeyType::Email => "EMAIL",
        PixKeyType::Phone => "TELEFONE",
        PixKeyType::Random => "CHAVE_ALEATORIA",
        PixKeyType::Account => "AGENCIA_CONTA",
    }
}

/// SISPAG key type back to canonical; unknown input is `cpf`
pub fn parse_key_type(key_type: &str) -> PixKeyType {
    match key_type.trim().to_ascii_uppercase().as_str() {
        "CNPJ" => PixKeyType::Cnpj,
        "EMAIL" => PixKeyType::Email,
        "TELEFONE" => PixKeyType::Phone,
        "CHAVE_ALEATORIA" | "EVP" => PixKeyType::Random,
        "AGENCIA_CONTA" => PixKeyType::Account,
        _ => PixKeyType::Cpf,
    }
}

fn map_account_type(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Checking => "CORRENTE",
        AccountType::Savings => "POUPANCA",
    }
}

#[derive(Serialize)]
struct TokenBody<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    scope: &'a str,
}

#[derive(Serialize)]
struct Payment<'a> {
    id_requisicao: &'a str,
    #[serde(with = "money::major_units")]
    valor: i64,
    descricao: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chave_pagador: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conta_pagador: Option<Account<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chave_recebedor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo_chave: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conta_recebedor: Option<Account<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpf_cnpj_recebedor: Option<&'a str>,
}

#[derive(Serialize)]
struct Account<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ispb: Option<&'a str>,
    agencia: &'a str,
    conta: &'a str,
    tipo: &'static str,
}

impl<'a> Account<'a> {
    fn from_account(account: &'a BankAccount) -> Self {
        Account {
            ispb: Some(account.ispb.as_str()).filter(|ispb| !ispb.is_empty()),
            agencia: &account.agency,
            conta: &account.number,
            tipo: map_account_type(account.account_type),
        }
    }
}

impl<'a> Payment<'a> {
    fn from_request(request: &'a TransferRequest) -> Self {
        let payer = &request.payer;
        let payee = &request.payee;

        let mut payment = Payment {
            id_requisicao: &request.external_id,
            valor: request.amount,
            descricao: &request.description,
            chave_pagador: None,
            conta_pagador: None,
            chave_recebedor: None,
            tipo_chave: None,
            conta_recebedor: None,
            cpf_cnpj_recebedor: Some(payee.document.as_str()).filter(|doc| !doc.is_empty()),
        };

        match payer.key() {
            Some(key) => payment.chave_pagador = Some(key),
            None => payment.conta_pagador = payer.account.as_ref().map(Account::from_account),
        }

        match payee.key() {
            Some(key) => {
                payment.chave_recebedor = Some(key);
                payment.tipo_chave = Some(map_key_type(payee.pix_key_type.unwrap_or_default()));
            }
            None => payment.conta_recebedor = payee.account.as_ref().map(Account::from_account),
        }

        payment
    }
}

#[derive(Deserialize)]
struct PaymentReply {
    #[serde(default)]
    id_requisicao: String,
    #[serde(default)]
    end_to_end_id: String,
    #[serde(default)]
    status: String,
    #[serde(default, with = "money::major_units")]
    valor: i64,
    #[serde(default)]
    recebedor: Option<Recebedor>,
}

#[derive(Deserialize)]
struct Recebedor {
    #[serde(default)]
    nome: String,
    #[serde(default)]
    cpf_cnpj: String,
    #[serde(default)]
    chave_pix: Option<String>,
}

impl Recebedor {
    fn into_party(self) -> Party {
        Party {
            name: self.nome,
            document: self.cpf_cnpj,
            pix_key: self.chave_pix.filter(|key| !key.is_empty()),
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct StaticQr<'a> {
    chave_pix: &'a str,
    #[serde(with = "money::major_units")]
    valor: i64,
    descricao: &'a str,
}

#[derive(Serialize)]
struct DynamicQr<'a> {
    chave_pix: &'a str,
    #[serde(with = "money::major_units")]
    valor: i64,
    descricao: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiracao: Option<u32>,
    permite_alterar: bool,
}

#[derive(Deserialize)]
struct QrReply {
    #[serde(default)]
    id_qrcode: String,
    #[serde(default)]
    qrcode: String,
    #[serde(default)]
    qrcode_imagem: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, with = "money::major_units")]
    valor: i64,
    #[serde(default)]
    descricao: String,
}

#[derive(Deserialize)]
struct DictEntry {
    #[serde(default)]
    chave: String,
    #[serde(default)]
    tipo_chave: String,
    #[serde(default)]
    nome: String,
    #[serde(default)]
    cpf_cnpj: String,
    #[serde(default)]
    banco: String,
    #[serde(default)]
    ispb: String,
    #[serde(default)]
    tipo_conta: Option<String>,
}

fn qr_response(
    wire: QrReply,
    raw: serde_json::Value,
    request: &QrCodeRequest,
    expires_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
) -> QrCodeResponse {
    QrCodeResponse {
        qr_code_id: wire.id_qrcode,
        qr_code: wire.qrcode,
        qr_code_image: wire.qrcode_imagem.filter(|image| !image.is_empty()),
        amount: request.amount,
        description: request.description.clone(),
        status: wire.status.unwrap_or_else(|| "active".to_string()),
        expires_at,
        created_at,
        raw_response: raw,
    }
}

#[async_trait]
impl PixProvider for ItauProvider {
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
        let request = json_body(
            http.token_request(credentials.certificate.as_ref())?,
            &TokenBody {
                grant_type: "client_credentials",
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
                scope: SCOPE,
            },
        )?;

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
        let payload = Payment::from_request(request);

        let outbound = http.post_json(&request.auth, "/sispag/v1/pagamentos/pix", &payload)?;
        let reply = http.execute(ctx, Operation::CreateTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PaymentReply>()?;

        let status = map_status(&wire.status);
        let now = Utc::now();

        Ok(TransferResponse {
            provider_tx_id: wire.id_requisicao,
            end_to_end_id: wire.end_to_end_id,
            status,
            amount: request.amount,
            description: request.description.clone(),
            payee: wire.recebedor.map(Recebedor::into_party),
            processed_at: Some(now),
            completed_at: (status == TransactionStatus::Completed).then_some(now),
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
        let outbound = http.get_resource(
            &request.auth,
            "/sispag/v1/pagamentos/pix",
            &request.provider_tx_id,
        )?;
        let reply = http.execute(ctx, Operation::GetTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<PaymentReply>()?;

        Ok(TransferResponse {
            provider_tx_id: if wire.id_requisicao.is_empty() {
                request.provider_tx_id.clone()
            } else {
                wire.id_requisicao
            },
            end_to_end_id: wire.end_to_end_id,
            status: map_status(&wire.status),
            amount: wire.valor,
            payee: wire.recebedor.map(Recebedor::into_party),
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
            chave_pix: &request.pix_key,
            valor: request.amount,
            descricao: &request.description,
        };

        let outbound = http.post_json(&request.auth, "/sispag/v1/qrcodes/estatico", &payload)?;
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
            chave_pix: &request.pix_key,
            valor: request.amount,
            descricao: &request.description,
            expiracao: request.expires_in_seconds.filter(|seconds| *seconds > 0),
            permite_alterar: request.allow_change,
        };

        let outbound = http.post_json(&request.auth, "/sispag/v1/qrcodes/dinamico", &payload)?;
        let reply = http
            .execute(ctx, Operation::CreateQrCodeDynamic, outbound)
            .await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        let created_at = Utc::now();
        let expires_at = request.expiry_from(created_at);
        Ok(qr_response(wire, raw, request, expires_at, created_at))
    }

    async fn get_qr_code(
        &self,
        ctx: &CallContext,
        request: &GetQrCodeRequest,
    ) -> Result<QrCodeResponse> {
        let http = self.http()?;
        let outbound = http.get_resource(&request.auth, "/sispag/v1/qrcodes", &request.qr_code_id)?;
        let reply = http.execute(ctx, Operation::GetQrCode, outbound).await?;
        let (wire, raw) = reply.decode::<QrReply>()?;

        Ok(QrCodeResponse {
            qr_code_id: wire.id_qrcode,
            qr_code: wire.qrcode,
            qr_code_image: wire.qrcode_imagem.filter(|image| !image.is_empty()),
            amount: wire.valor,
            description: wire.descricao,
            status: wire.status.unwrap_or_default(),
            expires_at: None,
            created_at: Utc::now(),
            raw_response: raw,
        })
    }

    async fn validate_pix_key(
        &self,
        ctx: &CallContext,
        request: &ValidatePixKeyRequest,
    ) -> Result<ValidatePixKeyResponse> {
        let http = self.http()?;
        let outbound =
            http.get_resource(&request.auth, "/sispag/v1/dict/chaves", &request.pix_key)?;
        let reply = match http.execute(ctx, Operation::ValidatePixKey, outbound).await {
            Ok(reply) => reply,
            Err(e) if e.code == ErrorCode::NotFound => {
                debug!(provider = CODE, "PIX key not registered in DICT");
                return Ok(ValidatePixKeyResponse {
                    valid: false,
                    pix_key: request.pix_key.clone(),
                    pix_key_type: request.pix_key_type,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };
        let (entry, _) = reply.decode::<DictEntry>()?;

        Ok(ValidatePixKeyResponse {
            valid: true,
            pix_key: if entry.chave.is_empty() {
                request.pix_key.clone()
            } else {
                entry.chave
            },
            pix_key_type: if entry.tipo_chave.is_empty() {
                request.pix_key_type
            } else {
                parse_key_type(&entry.tipo_chave)
            },
            name: entry.nome,
            document: entry.cpf_cnpj,
            bank: entry.banco,
            ispb: entry.ispb,
            account_type: entry.tipo_conta.map(|kind| match kind.as_str() {
                "POUPANCA" => AccountType::Savings,
                _ => AccountType::Checking,
            }),
        })
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<()> {
        self.http()?.probe_base_url(ctx).await
    }

    fn supported_methods(&self) -> &'static [Capability] {
        SUPPORTED
    }
}
