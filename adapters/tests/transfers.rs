//! Transfer, QR code and key lookup exchanges against mock institutions

mod common;

use common::{auth, bind};
use pix_adapters::{
    BancoDoBrasilProvider, BankAccount, BradescoProvider, CallContext, ErrorCode,
    GetQrCodeRequest, GetTransferRequest, InterProvider, ItauProvider, Party, PixKeyType,
    PixProvider, QrCodeRequest, SantanderProvider, TransactionStatus, TransferRequest,
    ValidatePixKeyRequest,
};
use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn transfer(amount: i64) -> TransferRequest {
    TransferRequest {
        external_id: "order-42".to_string(),
        amount,
        description: "Pedido 42".to_string(),
        payer: Party {
            name: "Loja Exemplo".to_string(),
            document: "12345678000199".to_string(),
            account: Some(BankAccount {
                agency: "0001".to_string(),
                number: "998877".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        payee: Party {
            name: "Maria Silva".to_string(),
            document: "12345678909".to_string(),
            pix_key: Some("maria@example.com".to_string()),
            pix_key_type: Some(PixKeyType::Email),
            ..Default::default()
        },
        metadata: Default::default(),
        auth: auth(),
    }
}

#[tokio::test]
async fn test_itau_amount_survives_wire_round_trip() {
    let provider = ItauProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/sispag/v1/pagamentos/pix"))
        .and(bearer_token("access-123"))
        .and(body_partial_json(json!({
            "id_requisicao": "order-42",
            "valor": 100.5,
            "chave_recebedor": "maria@example.com",
            "tipo_chave": "EMAIL"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id_requisicao": "itau-tx-1",
            "end_to_end_id": "E60701190202401011200abcdef123456",
            "status": "PROCESSANDO",
            "valor": 100.50
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sispag/v1/pagamentos/pix/itau-tx-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_requisicao": "itau-tx-1",
            "status": "LIQUIDADO",
            "valor": 100.50,
            "recebedor": {"nome": "Maria Silva", "cpf_cnpj": "***.456.789-**"}
        })))
        .mount(&server)
        .await;

    let ctx = CallContext::new();
    let created = provider.create_transfer(&ctx, &transfer(10050)).await.unwrap();
    assert_eq!(created.provider_tx_id, "itau-tx-1");
    assert_eq!(created.status, TransactionStatus::Processing);
    assert_eq!(created.amount, 10050);
    assert_eq!(created.raw_response["status"], "PROCESSANDO");

    let fetched = provider
        .get_transfer(
            &ctx,
            &GetTransferRequest {
                provider_tx_id: "itau-tx-1".to_string(),
                auth: auth(),
            },
        )
        .await
        .unwrap();
    assert_eq!(fetched.amount, 10050);
    assert_eq!(fetched.status, TransactionStatus::Completed);
    assert_eq!(fetched.payee.unwrap().name, "Maria Silva");
}

#[tokio::test]
async fn test_banco_do_brasil_sends_two_decimal_string() {
    let provider = BancoDoBrasilProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/pix/v1/pix"))
        .and(body_partial_json(json!({
            "valor": "100.50",
            "chave": "maria@example.com",
            "txid": "order-42"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "txid": "order-42",
            "endToEndId": "E00000000202401011200abcdef123456",
            "status": "EM_PROCESSAMENTO",
            "valor": "100.50"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider
        .create_transfer(&CallContext::new(), &transfer(10050))
        .await
        .unwrap();
    assert_eq!(response.amount, 10050);
    assert_eq!(response.status, TransactionStatus::Processing);
    assert_eq!(response.end_to_end_id, "E00000000202401011200abcdef123456");
}

#[tokio::test]
async fn test_santander_sends_minor_units_and_application_key() {
    let provider = SantanderProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/pix/v1/payments"))
        .and(header("X-Application-Key", "client-123"))
        .and(body_partial_json(json!({
            "amount": {"value": 10050, "currency": "BRL"},
            "externalId": "order-42"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactionId": "san-1",
            "status": "SETTLED"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider
        .create_transfer(&CallContext::new(), &transfer(10050))
        .await
        .unwrap();
    assert_eq!(response.provider_tx_id, "san-1");
    assert_eq!(response.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_bradesco_rejection_reason() {
    let provider = BradescoProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/v1/spi/solicitar-transferencia"))
        .and(body_partial_json(json!({
            "valor": 100.5,
            "pagador": {"agencia": "0001", "conta": "998877"},
            "recebedor": {"chavePix": "maria@example.com"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idTransacao": "brad-1",
            "status": "REJEITADA",
            "valor": 100.5,
            "motivo": "Chave PIX inexistente"
        })))
        .mount(&server)
        .await;

    let response = provider
        .create_transfer(&CallContext::new(), &transfer(10050))
        .await
        .unwrap();
    assert_eq!(response.status, TransactionStatus::Failed);
    assert_eq!(response.amount, 10050);
    assert_eq!(response.error_message.as_deref(), Some("Chave PIX inexistente"));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/banking/v2/pix"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = provider
        .create_transfer(&CallContext::new(), &transfer(100))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::TransferFailed);
    assert_eq!(err.status_code, 503);
    assert!(err.retryable);
    assert_eq!(err.details["provider"], "inter");
    assert_eq!(err.details["response"], "Service Unavailable");
}

#[tokio::test]
async fn test_business_rejection_is_not_retryable() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/banking/v2/pix"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "title": "SALDO_INSUFICIENTE",
            "detail": "Saldo insuficiente para a operação"
        })))
        .mount(&server)
        .await;

    let err = provider
        .create_transfer(&CallContext::new(), &transfer(100))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::TransferFailed);
    assert_eq!(err.status_code, 422);
    assert!(!err.retryable);
    assert!(err.is_client_error());
    assert_eq!(err.details["bank_code"], "SALDO_INSUFICIENTE");
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let provider = ItauProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/sispag/v1/pagamentos/pix"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = provider
        .create_transfer(&CallContext::new(), &transfer(100))
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ParseError);
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_unknown_transfer_is_not_found() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("GET"))
        .and(path("/banking/v2/pix/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = provider
        .get_transfer(
            &CallContext::new(),
            &GetTransferRequest {
                provider_tx_id: "missing".to_string(),
                auth: auth(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.status_code, 404);
}

#[tokio::test]
async fn test_ids_are_escaped_into_one_path_segment() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("GET"))
        .and(path("/banking/v2/pix/tx%2F1%3Fx=1%23y"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "codigoSolicitacao": "tx/1?x=1#y",
            "status": "REALIZADO",
            "valor": 1.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider
        .get_transfer(
            &CallContext::new(),
            &GetTransferRequest {
                provider_tx_id: "tx/1?x=1#y".to_string(),
                auth: auth(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.amount, 100);
}

#[tokio::test]
async fn test_out_of_range_amount_is_parse_error() {
    let provider = ItauProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("GET"))
        .and(path("/sispag/v1/pagamentos/pix/itau-huge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_requisicao": "itau-huge",
            "status": "LIQUIDADO",
            "valor": "50000000000000000000000000000"
        })))
        .mount(&server)
        .await;

    let err = provider
        .get_transfer(
            &CallContext::new(),
            &GetTransferRequest {
                provider_tx_id: "itau-huge".to_string(),
                auth: auth(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ParseError);
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_dynamic_qr_delegates_to_static_with_expiry() {
    let provider = BancoDoBrasilProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path("/pix/v1/cobqrcode"))
        .and(body_partial_json(json!({
            "valor": {"original": "25.00"},
            "calendario": {"expiracao": 3600}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "txid": "qr-1",
            "qrcode": "00020126580014br.gov.bcb.pix"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = QrCodeRequest {
        amount: 2500,
        pix_key: "loja@example.com".to_string(),
        expires_in_seconds: Some(3600),
        auth: auth(),
        ..Default::default()
    };

    let response = provider
        .create_qr_code_dynamic(&CallContext::new(), &request)
        .await
        .unwrap();

    assert_eq!(response.qr_code_id, "qr-1");
    assert_eq!(response.amount, 2500);
    let expires_at = response.expires_at.unwrap();
    assert_eq!((expires_at - response.created_at).num_seconds(), 3600);
}

#[tokio::test]
async fn test_inter_get_qr_code() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("GET"))
        .and(path("/banking/v2/pix/qrcode/qr-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "txid": "qr-9",
            "pixCopiaECola": "00020126...",
            "status": "CONCLUIDA"
        })))
        .mount(&server)
        .await;

    let response = provider
        .get_qr_code(
            &CallContext::new(),
            &GetQrCodeRequest {
                qr_code_id: "qr-9".to_string(),
                auth: auth(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.qr_code, "00020126...");
    // QR status is passed through unmapped
    assert_eq!(response.status, "CONCLUIDA");
}

#[tokio::test]
async fn test_itau_validate_pix_key() {
    let provider = ItauProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("GET"))
        .and(path("/sispag/v1/dict/chaves/+5511988887777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chave": "+5511988887777",
            "tipo_chave": "TELEFONE",
            "nome": "Maria Silva",
            "ispb": "60701190",
            "tipo_conta": "POUPANCA"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sispag/v1/dict/chaves/gh%23ost@example.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let ctx = CallContext::new();
    let found = provider
        .validate_pix_key(
            &ctx,
            &ValidatePixKeyRequest {
                pix_key: "+5511988887777".to_string(),
                pix_key_type: PixKeyType::Phone,
                auth: auth(),
            },
        )
        .await
        .unwrap();
    assert!(found.valid);
    assert_eq!(found.pix_key_type, PixKeyType::Phone);
    assert_eq!(found.name, "Maria Silva");

    let missing = provider
        .validate_pix_key(
            &ctx,
            &ValidatePixKeyRequest {
                pix_key: "gh#ost@example.com".to_string(),
                pix_key_type: PixKeyType::Email,
                auth: auth(),
            },
        )
        .await
        .unwrap();
    assert!(!missing.valid);
    assert_eq!(missing.pix_key, "gh#ost@example.com");
}

#[tokio::test]
async fn test_capability_gaps() {
    let ctx = CallContext::new();

    let santander = SantanderProvider::new();
    let err = santander
        .validate_pix_key(&ctx, &ValidatePixKeyRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotImplemented);

    let inter = InterProvider::new();
    let err = inter
        .cancel_transfer(&ctx, &Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotSupported);
}
