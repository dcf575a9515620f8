//! Shared fixtures for the adapter integration tests

#![allow(dead_code)]

use pix_adapters::{CallAuth, PixProvider, ProviderConfig};
use wiremock::MockServer;

pub const TOKEN_PATH: &str = "/oauth/token";

/// Config pointing both endpoints at the mock institution
pub fn config_for(server: &MockServer) -> ProviderConfig {
    let mut config = ProviderConfig::new(server.uri(), format!("{}{}", server.uri(), TOKEN_PATH));
    config.timeout_seconds = 5;
    config
}

/// Initialize `provider` against a fresh mock institution
pub async fn bind<P: PixProvider>(provider: &P) -> MockServer {
    let server = MockServer::start().await;
    provider.initialize(config_for(&server)).unwrap();
    server
}

pub fn auth() -> CallAuth {
    CallAuth {
        access_token: "access-123".to_string(),
        client_id: "client-123".to_string(),
        certificate: None,
    }
}
