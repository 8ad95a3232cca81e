//! Mock Vault endpoints
//!
//! Responses mirror the JSON shapes Vault returns from `sys/health`,
//! `sys/init` and `sys/unseal`.

use serde_json::json;
use std::time::Duration;
use vault_init::VaultHttpClient;
use vault_init_core::VaultSettings;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a client pointed at the mock server
pub fn client_for(server: &MockServer) -> VaultHttpClient {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    VaultHttpClient::new(&VaultSettings {
        address: server.uri(),
        skip_verify: false,
        timeout: Duration::from_secs(5),
    })
    .expect("client builds")
}

pub fn health_body(initialized: bool, sealed: bool, standby: bool) -> serde_json::Value {
    json!({
        "initialized": initialized,
        "sealed": sealed,
        "standby": standby,
        "performance_standby": false,
        "replication_performance_mode": "disabled",
        "replication_dr_mode": "disabled",
        "server_time_utc": 1_700_000_000,
        "version": "1.17.2",
        "cluster_name": "vault-cluster-test"
    })
}

/// Health endpoint answering with the given status code and state
pub async fn mock_health(server: &MockServer, status: u16, initialized: bool, sealed: bool, standby: bool) {
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(status).set_body_json(health_body(initialized, sealed, standby)))
        .mount(server)
        .await;
}

/// Unseal endpoint answering `sealed` for the next `times` submissions
pub async fn mock_unseal_response(server: &MockServer, sealed: bool, progress: u32, times: u64) {
    Mock::given(method("PUT"))
        .and(path("/v1/sys/unseal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "shamir",
            "initialized": true,
            "sealed": sealed,
            "t": 3,
            "n": 5,
            "progress": progress,
            "version": "1.17.2"
        })))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

/// Endpoint failing with Vault's error envelope
pub async fn mock_vault_error(server: &MockServer, http_method: &str, endpoint: &str, status: u16, message: &str) {
    Mock::given(method(http_method))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "errors": [message] })))
        .mount(server)
        .await;
}
