// Inspection endpoints served over a real socket.

use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::settings::SettingsConfig;
use crate::error::AuthError;
use crate::manager::token_manager::TokenManager;
use crate::server::server::{app, bind, serve as serve_on, AppState};
use crate::store::MemoryCredentialStore;
use crate::tests::common::{
    build_reqwest_client, metrics, record_expiring_in, spawn_axum, test_settings, ScriptedExchange,
};

async fn serve(store: MemoryCredentialStore, exchange: Arc<ScriptedExchange>) -> (String, TokenManager) {
    let metrics = metrics();
    let manager = TokenManager::start(test_settings(), Arc::new(store), exchange, metrics.clone()).await;

    let mut settings = SettingsConfig::default();
    settings.metrics.is_enabled = true;
    let router = app(&settings, AppState::new(manager.clone(), metrics));
    let (_handle, addr) = spawn_axum(router).await;
    (format!("http://{}", addr), manager)
}

#[tokio::test]
async fn status_reports_record_without_token_values() {
    let store = MemoryCredentialStore::with_record(record_expiring_in("0", 3600));
    let (base, manager) = serve(store, Arc::new(ScriptedExchange::new())).await;

    let resp = build_reqwest_client()
        .get(format!("{base}/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let text = resp.text().await.unwrap();
    assert!(!text.contains("access-0"));
    assert!(!text.contains("refresh-0"));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["has_token"], json!(true));
    assert_eq!(body["owner_id"], json!("owner-1"));
    assert_eq!(body["needs_renewal"], json!(false));
    assert_eq!(body["state"], json!("idle"));
    assert!(body["time_remaining_seconds"].as_i64().unwrap() > 3500);
    manager.shutdown().await;
}

#[tokio::test]
async fn authorize_installs_a_new_record() {
    let exchange = Arc::new(ScriptedExchange::new());
    let (base, manager) = serve(MemoryCredentialStore::new(), exchange.clone()).await;
    let client = build_reqwest_client();

    let resp = client
        .post(format!("{base}/authorize"))
        .json(&json!({"code": "consent-code"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["has_token"], json!(true));
    assert_eq!(exchange.code_calls(), 1);

    assert_eq!(manager.get_valid_token().await, Ok("access-1".to_owned()));
    manager.shutdown().await;
}

#[tokio::test]
async fn authorize_rejects_empty_and_invalid_codes() {
    let exchange = Arc::new(ScriptedExchange::new());
    exchange.fail_next_code(AuthError::InvalidGrant("code expired".into()));
    exchange.fail_next_code(AuthError::Transient("upstream 503".into()));
    let (base, manager) = serve(MemoryCredentialStore::new(), exchange.clone()).await;
    let client = build_reqwest_client();

    let empty = client
        .post(format!("{base}/authorize"))
        .json(&json!({"code": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    assert_eq!(exchange.code_calls(), 0);

    let invalid = client
        .post(format!("{base}/authorize"))
        .json(&json!({"code": "old-code"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let body: Value = invalid.json().await.unwrap();
    assert_eq!(body["error"], json!("invalid_grant"));

    let upstream = client
        .post(format!("{base}/authorize"))
        .json(&json!({"code": "another-code"}))
        .send()
        .await
        .unwrap();
    assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

    assert!(!manager.get_status().await.has_token);
    manager.shutdown().await;
}

#[tokio::test]
async fn metrics_endpoint_exposes_agent_metrics() {
    let store = MemoryCredentialStore::with_record(record_expiring_in("0", 300));
    let (base, manager) = serve(store, Arc::new(ScriptedExchange::new())).await;

    let resp = build_reqwest_client()
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let text = resp.text().await.unwrap();
    assert!(text.contains("oauthagent_renewal_attempts_total{trigger=\"startup\"} 1"));
    assert!(text.contains("oauthagent_up 1"));
    assert!(text.contains("oauthagent_token_expiry_unix_seconds"));
    manager.shutdown().await;
}

#[tokio::test]
async fn bind_reports_an_occupied_port_up_front() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut settings = SettingsConfig::default();
    settings.server.host = "127.0.0.1".into();
    settings.server.port = taken.local_addr().unwrap().port().to_string();

    let err = bind(&settings).await.unwrap_err();
    assert!(format!("{err:#}").contains("failed to bind http server on 127.0.0.1:"));

    settings.server.is_enabled = false;
    assert!(bind(&settings).await.unwrap().is_none());
}

#[tokio::test]
async fn bound_listener_serves_until_cancelled() {
    let store = MemoryCredentialStore::with_record(record_expiring_in("0", 3600));
    let metrics = metrics();
    let manager = TokenManager::start(
        test_settings(),
        Arc::new(store),
        Arc::new(ScriptedExchange::new()),
        metrics.clone(),
    )
    .await;

    let mut settings = SettingsConfig::default();
    settings.server.host = "127.0.0.1".into();
    settings.server.port = "0".into();
    let listener = bind(&settings).await.unwrap().unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let server = tokio::spawn({
        let state = AppState::new(manager.clone(), metrics);
        let shutdown = shutdown.clone();
        async move { serve_on(listener, &settings, state, shutdown).await }
    });

    let resp = build_reqwest_client()
        .get(format!("http://{addr}/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    shutdown.cancel();
    assert!(server.await.unwrap().is_ok());
    manager.shutdown().await;
}
