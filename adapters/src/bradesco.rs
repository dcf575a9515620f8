//! Bradesco adapter
//!
//! JSON-body OAuth2 over optional mTLS; the token endpoint issues refresh
//! tokens, so `refresh_token` is supported. Transfers only: the SPI API has
//! no QR code or DICT surface.

use crate::http::{json_body, BankHttp, Operation, TokenGrant};
use crate::{
    money, AccountType, AuthToken, CallContext, Capability, GetQrCodeRequest, GetTransferRequest,
    Party, PixProvider, ProviderConfig, ProviderCredentials, ProviderError, QrCodeRequest,
    QrCodeResponse, Result, TransactionStatus, TransferRequest, TransferResponse,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Registry code
pub const CODE: &str = "bradesco";

/// Bradesco ISPB
pub const ISPB: &str = "60746948";

const NAME: &str = "Bradesco";

const SUPPORTED: &[Capability] = &[
    Capability::PixKey,
    Capability::Account,
    Capability::Transfer,
    Capability::GetTransfer,
    Capability::RefreshToken,
];

/// Bradesco
#[derive(Default)]
pub struct BradescoProvider {
    http: OnceLock<BankHttp>,
}

impl BradescoProvider {
    /// Uninitialized adapter
    pub fn new() -> Self {
        Self::default()
    }

    fn http(&self) -> Result<&BankHttp> {
        BankHttp::bound(&self.http, CODE)
    }
}

/// SPI transfer status to canonical
pub fn map_status(status: &str) -> TransactionStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "EM_PROCESSAMENTO" => TransactionStatus::Processing,
        "CONCLUIDA" => TransactionStatus::Completed,
        "REJEITADA" | "ERRO" => TransactionStatus::Failed,
        "CANCELADA" => TransactionStatus::Cancelled,
        _ => TransactionStatus::Pending,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Transfer<'a> {
    id_transacao: &'a str,
    #[serde(with = "money::major_units")]
    valor: i64,
    descricao: &'a str,
    pagador: Participant<'a>,
    recebedor: Participant<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Participant<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    chave_pix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    banco: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agencia: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conta: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo_conta: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpf_cnpj: Option<&'a str>,
}

impl<'a> Participant<'a> {
    fn from_party(party: &'a Party) -> Self {
        let mut participant = Participant {
            chave_pix: None,
            banco: None,
            agencia: None,
            conta: None,
            tipo_conta: None,
            cpf_cnpj: Some(party.document.as_str()).filter(|doc| !doc.is_empty()),
        };

        match (party.key(), &party.account) {
            (Some(key), _) => participant.chave_pix = Some(key),
            (None, Some(account)) => {
                participant.banco = Some(&account.bank_code);
                participant.agencia = Some(&account.agency);
                participant.conta = Some(&account.number);
                participant.tipo_conta = Some(map_account_type(account.account_type));
            }
            (None, None) => {}
        }

        participant
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferReply {
    #[serde(default)]
    id_transacao: String,
    #[serde(default)]
    end_to_end_id: String,
    #[serde(default)]
    status: String,
    #[serde(default, with = "money::major_units")]
    valor: i64,
    #[serde(default)]
    data_hora: Option<String>,
    #[serde(default)]
    motivo: Option<String>,
}

impl TransferReply {
    fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.data_hora
            .as_deref()
            .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
            .map(|stamp| stamp.with_timezone(&Utc))
    }

    fn into_response(self, raw: serde_json::Value) -> TransferResponse {
        let status = map_status(&self.status);
        let processed_at = self.processed_at();

        let error_message = match status {
            TransactionStatus::Failed => self.motivo.filter(|reason| !reason.is_empty()),
            _ => None,
        };

        TransferResponse {
            provider_tx_id: self.id_transacao,
            end_to_end_id: self.end_to_end_id,
            status,
            amount: self.valor,
            processed_at,
            completed_at: (status == TransactionStatus::Completed)
                .then(|| processed_at.unwrap_or_else(Utc::now)),
            error_code: error_message.as_ref().map(|_| self.status.clone()),
            error_message,
            raw_response: raw,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PixProvider for BradescoProvider {
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
                refresh_token: None,
            },
        )?;

        let reply = http.execute(ctx, Operation::Authenticate, request).await?;
        let (grant, _) = reply.decode::<TokenGrant>()?;
        Ok(grant.into_token())
    }

    async fn refresh_token(
        &self,
        ctx: &CallContext,
        credentials: &ProviderCredentials,
        token: &AuthToken,
    ) -> Result<AuthToken> {
        let http = self.http()?;

        // Tokens issued without a refresh token can only be replaced
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::not_supported(CODE, "refresh_token"))?;

        let request = json_body(
            http.token_request(credentials.certificate.as_ref())?,
            &TokenBody {
                grant_type: "refresh_token",
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
                refresh_token: Some(refresh_token),
            },
        )?;

        let reply = http.execute(ctx, Operation::RefreshToken, request).await?;
        let (grant, _) = reply.decode::<TokenGrant>()?;
        let mut refreshed = grant.into_token();
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = token.refresh_token.clone();
        }
        Ok(refreshed)
    }

    async fn create_transfer(
        &self,
        ctx: &CallContext,
        request: &TransferRequest,
    ) -> Result<TransferResponse> {
        let http = self.http()?;
        let payload = Transfer {
            id_transacao: &request.external_id,
            valor: request.amount,
            descricao: &request.description,
            pagador: Participant::from_party(&request.payer),
            recebedor: Participant::from_party(&request.payee),
        };

        let outbound = http.post_json(&request.auth, "/v1/spi/solicitar-transferencia", &payload)?;
        let reply = http.execute(ctx, Operation::CreateTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<TransferReply>()?;

        let mut response = wire.into_response(raw);
        response.amount = request.amount;
        response.description = request.description.clone();
        response.payer = Some(request.payer.clone());
        response.payee = Some(request.payee.clone());
        if response.processed_at.is_none() {
            response.processed_at = Some(Utc::now());
        }
        Ok(response)
    }

    async fn get_transfer(
        &self,
        ctx: &CallContext,
        request: &GetTransferRequest,
    ) -> Result<TransferResponse> {
        let http = self.http()?;
        let outbound = http.get_resource(
            &request.auth,
            "/v1/spi/consultar-transferencia",
            &request.provider_tx_id,
        )?;
        let reply = http.execute(ctx, Operation::GetTransfer, outbound).await?;
        let (wire, raw) = reply.decode::<TransferReply>()?;

        let mut response = wire.into_response(raw);
        if response.provider_tx_id.is_empty() {
            response.provider_tx_id = request.provider_tx_id.clone();
        }
        Ok(response)
    }

    async fn create_qr_code_static(
        &self,
        _ctx: &CallContext,
        _request: &QrCodeRequest,
    ) -> Result<QrCodeResponse> {
        Err(ProviderError::not_implemented(CODE, "create_qr_code_static"))
    }

    async fn create_qr_code_dynamic(
        &self,
        _ctx: &CallContext,
        _request: &QrCodeRequest,
    ) -> Result<QrCodeResponse> {
        Err(ProviderError::not_implemented(CODE, "create_qr_code_dynamic"))
    }

    async fn get_qr_code(
        &self,
        _ctx: &CallContext,
        _request: &GetQrCodeRequest,
    ) -> Result<QrCodeResponse> {
        Err(ProviderError::not_implemented(CODE, "get_qr_code"))
    }

    async fn health_check(&self, ctx: &CallContext) -> Result<()> {
        self.http()?.probe_base_url(ctx).await
    }

    fn supported_methods(&self) -> &'static [Capability] {
        SUPPORTED
    }
}
