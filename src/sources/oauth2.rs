use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::cache::token_record::TokenRecord;
use crate::config::provider::ProviderConfig;
use crate::error::AuthError;
use crate::helpers::time::now;
use crate::parser::token_response::{parse_token_response, ResponseContext};
use crate::sources::TokenExchange;
use crate::utils::constants::{GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN};

/// Form-encoded POSTs to the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct OAuth2ExchangeClient {
    client: Client,
    provider: ProviderConfig,
}

impl OAuth2ExchangeClient {
    pub fn new(provider: ProviderConfig, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self { client, provider })
    }

    async fn post_grant(
        &self,
        grant_type: &str,
        form: &[(&str, &str)],
        previous: Option<&TokenRecord>,
    ) -> Result<TokenRecord, AuthError> {
        debug!("POST {} grant_type={}", self.provider.token_url, grant_type);
        let response = self
            .client
            .post(&self.provider.token_url)
            .header(http::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Transient(transport_reason(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transient(transport_reason(&e)))?;

        parse_token_response(
            status,
            &body,
            ResponseContext {
                previous,
                configured_owner: self.provider.owner_id.as_deref(),
                now: now(),
            },
        )
    }
}

#[async_trait]
impl TokenExchange for OAuth2ExchangeClient {
    async fn exchange_authorization_code(&self, code: &str) -> Result<TokenRecord, AuthError> {
        info!("exchanging authorization code at {}", self.provider.token_url);
        let form = [
            ("grant_type", GRANT_AUTHORIZATION_CODE),
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
        ];
        self.post_grant(GRANT_AUTHORIZATION_CODE, &form, None).await
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, AuthError> {
        let form = [
            ("grant_type", GRANT_REFRESH_TOKEN),
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
            ("refresh_token", record.refresh_token.as_str()),
        ];
        self.post_grant(GRANT_REFRESH_TOKEN, &form, Some(record)).await
    }
}

fn transport_reason(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "token endpoint timed out".to_owned()
    } else if err.is_connect() {
        format!("cannot connect to token endpoint: {}", err)
    } else {
        format!("token endpoint transport error: {}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn provider(token_url: String) -> ProviderConfig {
        ProviderConfig {
            token_url,
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            redirect_uri: "https://app.example.com/callback".into(),
            owner_id: None,
        }
    }

    fn record() -> TokenRecord {
        TokenRecord::new(
            "A1".into(),
            "R1".into(),
            "Bearer".into(),
            "offline_access".into(),
            "42".into(),
            Utc::now() - ChronoDuration::hours(5),
            21600,
        )
    }

    #[tokio::test]
    async fn refresh_posts_refresh_grant_form() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .form_urlencoded_tuple("grant_type", "refresh_token")
                .form_urlencoded_tuple("client_id", "client-1")
                .form_urlencoded_tuple("client_secret", "secret-1")
                .form_urlencoded_tuple("refresh_token", "R1");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "access_token": "A2",
                    "refresh_token": "R2",
                    "expires_in": 21600,
                    "token_type": "Bearer",
                    "scope": "offline_access"
                }));
        });

        let client = OAuth2ExchangeClient::new(provider(server.url("/oauth/token")), Duration::from_secs(5)).unwrap();
        let old = record();
        let new = client.refresh(&old).await.unwrap();

        mock.assert();
        assert_eq!(new.access_token, "A2");
        assert_eq!(new.refresh_token, "R2");
        assert_eq!(new.owner_id, "42");
        assert!(new.issued_at > old.issued_at);
    }

    #[tokio::test]
    async fn authorization_code_posts_code_and_redirect_uri() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .form_urlencoded_tuple("grant_type", "authorization_code")
                .form_urlencoded_tuple("code", "TG-123")
                .form_urlencoded_tuple("redirect_uri", "https://app.example.com/callback");
            then.status(200).json_body(json!({
                "access_token": "A1",
                "refresh_token": "R1",
                "expires_in": 21600,
                "user_id": 777
            }));
        });

        let client = OAuth2ExchangeClient::new(provider(server.url("/oauth/token")), Duration::from_secs(5)).unwrap();
        let record = client.exchange_authorization_code("TG-123").await.unwrap();

        mock.assert_hits(1);
        assert_eq!(record.owner_id, "777");
        assert_eq!(record.ttl_seconds, 21600);
    }

    #[tokio::test]
    async fn invalid_grant_response_is_classified() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(400).json_body(json!({"error": "invalid_grant", "error_description": "expired"}));
        });

        let client = OAuth2ExchangeClient::new(provider(server.url("/oauth/token")), Duration::from_secs(5)).unwrap();
        let err = client.refresh(&record()).await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_as_transient() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .delay(std::time::Duration::from_millis(1500))
                .json_body(json!({"access_token": "A2", "refresh_token": "R2", "expires_in": 60}));
        });

        let client = OAuth2ExchangeClient::new(provider(server.url("/oauth/token")), Duration::from_millis(200)).unwrap();
        let err = client.refresh(&record()).await.unwrap_err();

        assert!(matches!(err, AuthError::Transient(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        let client = OAuth2ExchangeClient::new(provider("http://127.0.0.1:9/oauth/token".into()), Duration::from_millis(500)).unwrap();
        let err = client.refresh(&record()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
