//! Authentication handshakes against mock institutions

mod common;

use chrono::{Duration, Utc};
use common::{bind, TOKEN_PATH};
use pix_adapters::{
    BancoDoBrasilProvider, BradescoProvider, CallContext, ErrorCode, InterProvider, ItauProvider,
    PixProvider, ProviderCredentials, SantanderProvider,
};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

fn credentials() -> ProviderCredentials {
    ProviderCredentials::new("client-123", "secret-456")
}

#[tokio::test]
async fn test_expires_at_is_bounded_by_declared_lifetime() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "pagamento-pix.write"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now();
    let token = provider
        .authenticate(&CallContext::new(), &credentials())
        .await
        .unwrap();

    assert_eq!(token.access_token, "tok");
    assert_eq!(token.expires_in, 3600);
    assert!(token.expires_at > before);
    assert!(token.expires_at < before + Duration::seconds(3600 + 1));
    assert_eq!(token.scope.as_deref(), Some("pagamento-pix.write"));
}

#[tokio::test]
async fn test_missing_expiry_falls_back_to_default_ttl() {
    let provider = SantanderProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&server)
        .await;

    let before = Utc::now();
    let token = provider
        .authenticate(&CallContext::new(), &credentials())
        .await
        .unwrap();

    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, pix_adapters::DEFAULT_TOKEN_TTL_SECONDS);
    assert!(token.expires_at > before);
}

#[tokio::test]
async fn test_absurd_expiry_falls_back_to_default_ttl() {
    let provider = InterProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_in": i64::MAX
        })))
        .mount(&server)
        .await;

    let token = provider
        .authenticate(&CallContext::new(), &credentials())
        .await
        .unwrap();

    assert_eq!(token.expires_in, pix_adapters::DEFAULT_TOKEN_TTL_SECONDS);
    assert!(token.expires_at <= Utc::now() + Duration::seconds(token.expires_in));
}

#[tokio::test]
async fn test_banco_do_brasil_uses_basic_client_auth() {
    let provider = BancoDoBrasilProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(basic_auth("client-123", "secret-456"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "bb-token",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = provider
        .authenticate(&CallContext::new(), &credentials())
        .await
        .unwrap();
    assert_eq!(token.access_token, "bb-token");
}

#[tokio::test]
async fn test_itau_sends_json_token_request() {
    let provider = ItauProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_partial_json(json!({
            "grant_type": "client_credentials",
            "client_id": "client-123",
            "scope": "sispag"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "itau-token",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = provider
        .authenticate(&CallContext::new(), &credentials())
        .await
        .unwrap();
    assert_eq!(token.access_token, "itau-token");
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_failed() {
    let provider = ItauProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed"
        })))
        .mount(&server)
        .await;

    let err = provider
        .authenticate(&CallContext::new(), &credentials())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::AuthFailed);
    assert_eq!(err.status_code, 401);
    assert!(!err.retryable);
    assert_eq!(err.details["bank_code"], "invalid_client");
    assert!(err.message.contains("Client authentication failed"));
}

#[tokio::test]
async fn test_bradesco_refresh_token() {
    let provider = BradescoProvider::new();
    let server = bind(&provider).await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_partial_json(json!({"grant_type": "client_credentials"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "first",
            "refresh_token": "refresh-1",
            "expires_in": 120
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_partial_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "second",
            "expires_in": 120
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = CallContext::new();
    let token = provider.authenticate(&ctx, &credentials()).await.unwrap();
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));

    let refreshed = provider
        .refresh_token(&ctx, &credentials(), &token)
        .await
        .unwrap();
    assert_eq!(refreshed.access_token, "second");
    // Institution did not rotate it, keep the old one
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_refresh_not_supported_means_reauthenticate() {
    let providers: Vec<Box<dyn PixProvider>> = vec![
        Box::new(InterProvider::new()),
        Box::new(BancoDoBrasilProvider::new()),
        Box::new(SantanderProvider::new()),
        Box::new(ItauProvider::new()),
    ];

    let token = pix_adapters::AuthToken::from_grant("tok".into(), None, None, None, None);
    for provider in providers {
        let err = provider
            .refresh_token(&CallContext::new(), &credentials(), &token)
            .await
            .unwrap_err();
        assert!(err.is_not_supported(), "{}", provider.code());
    }
}
