//! OAuth token exchange
//!
//! The one back-channel call in the flow: POST the authorization code and
//! PKCE verifier to Spotify's token endpoint, authenticated with the
//! confidential client secret. Authorization codes are single use, so a
//! failed exchange is never retried; the participant restarts the flow.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::ClientConfig;
use crate::constants::TOKEN_LIFETIME_SECS;
use crate::error::{Error, Result};

/// Access token value. Redacted in Debug/Display.
pub type AccessToken = Secret<String>;

/// A bearer token and when it stops being valid.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: AccessToken,
    expires_at: u64,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, expires_at: u64) -> Self {
        Self {
            value: Secret::new(value.into()),
            expires_at,
        }
    }

    /// Token valid for `lifetime_secs` from `now_millis`.
    pub fn expiring_in(value: impl Into<String>, lifetime_secs: u64, now_millis: u64) -> Self {
        Self::new(value, now_millis.saturating_add(lifetime_secs.saturating_mul(1000)))
    }

    pub fn value(&self) -> &AccessToken {
        &self.value
    }

    /// Expiration as unix timestamp in milliseconds
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whole seconds of validity left at `now_millis`, zero once expired.
    pub fn remaining_secs(&self, now_millis: u64) -> u64 {
        self.expires_at.saturating_sub(now_millis) / 1000
    }
}

/// Successful token endpoint response.
///
/// `refresh_token` is deliberately not captured: this app never refreshes,
/// so holding one would only widen what can leak.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    TOKEN_LIFETIME_SECS
}

/// Structured error body from the token endpoint (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorBody {
    fn detail(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {description}", self.error),
            None => self.error.clone(),
        }
    }
}

/// Redeems an authorization code for a bearer token.
///
/// Uses `Pin<Box<dyn Future>>` so callers can hold `Arc<dyn TokenExchanger>`
/// and swap in a fake for tests.
pub trait TokenExchanger: Send + Sync {
    fn exchange<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BearerToken>> + Send + 'a>>;
}

/// Exchanger that talks to the real token endpoint over HTTP.
pub struct HttpTokenExchanger {
    client: reqwest::Client,
    config: ClientConfig,
    client_secret: Secret<String>,
}

impl HttpTokenExchanger {
    pub fn new(client: reqwest::Client, config: ClientConfig, client_secret: Secret<String>) -> Self {
        Self {
            client,
            config,
            client_secret,
        }
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<BearerToken> {
        let response = self
            .client
            .post(self.config.token_endpoint.clone())
            .basic_auth(&self.config.client_id, Some(self.client_secret.expose()))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "token endpoint unreachable");
                Error::exchange("token endpoint request failed")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TokenErrorBody>(&body) {
                Ok(err) => err.detail(),
                Err(_) => format!("token endpoint returned {status}"),
            };
            warn!(%status, detail = %detail, "token exchange rejected");
            return Err(Error::exchange(detail));
        }

        let token = response.json::<TokenResponse>().await.map_err(|e| {
            warn!(error = %e, "token endpoint returned a malformed body");
            Error::exchange("invalid token response")
        })?;

        if let Some(token_type) = token
            .token_type
            .as_deref()
            .filter(|t| !t.eq_ignore_ascii_case("bearer"))
        {
            return Err(Error::exchange(format!(
                "unsupported token type {token_type}"
            )));
        }

        debug!(expires_in = token.expires_in, scope = ?token.scope, "token issued");
        Ok(BearerToken::expiring_in(
            token.access_token,
            token.expires_in,
            now_millis(),
        ))
    }
}

impl TokenExchanger for HttpTokenExchanger {
    fn exchange<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BearerToken>> + Send + 'a>> {
        Box::pin(self.exchange_code(code, verifier))
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Form;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Captured = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

    /// Start a mock token endpoint that records each form body and
    /// Authorization header, then answers with `status` and `body`.
    async fn start_token_server(status: StatusCode, body: &'static str) -> (String, Captured) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured: Captured = Arc::default();
        let sink = captured.clone();

        let app = axum::Router::new().route(
            "/api/token",
            post(
                move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                    let sink = sink.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .map(|v| v.to_str().unwrap().to_string());
                        sink.lock().unwrap().push((form, auth));
                        (
                            status,
                            [(axum::http::header::CONTENT_TYPE, "application/json")],
                            body,
                        )
                    }
                },
            ),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/api/token"), captured)
    }

    fn exchanger_for(endpoint: &str) -> HttpTokenExchanger {
        let config = ClientConfig::new("study-client", "http://localhost:3000")
            .unwrap()
            .with_token_endpoint(endpoint)
            .unwrap();
        HttpTokenExchanger::new(
            reqwest::Client::new(),
            config,
            Secret::new("client-secret".into()),
        )
    }

    #[test]
    fn token_response_defaults_expiry() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"BQD"}"#).unwrap();
        assert_eq!(token.expires_in, TOKEN_LIFETIME_SECS);
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let token = BearerToken::new("BQD-secret", 0);
        assert!(!format!("{token:?}").contains("BQD-secret"));
    }

    #[test]
    fn remaining_secs_saturates() {
        let token = BearerToken::expiring_in("t", 3600, 1_000);
        assert_eq!(token.expires_at(), 3_601_000);
        assert_eq!(token.remaining_secs(1_000), 3600);
        assert_eq!(token.remaining_secs(10_000_000), 0);
    }

    #[tokio::test]
    async fn exchange_sends_form_and_client_credentials() {
        let (endpoint, captured) = start_token_server(
            StatusCode::OK,
            r#"{"access_token":"BQD-new","token_type":"Bearer","expires_in":3600,"refresh_token":"AQD","scope":"streaming"}"#,
        )
        .await;

        let before = now_millis();
        let token = exchanger_for(&endpoint)
            .exchange("auth-code", "verifier-value")
            .await
            .unwrap();

        assert_eq!(token.value().expose(), "BQD-new");
        assert!(token.expires_at() >= before + 3_600_000);

        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1, "exactly one POST, no retries");
        let (form, auth) = &requests[0];
        assert_eq!(form["client_id"], "study-client");
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["code"], "auth-code");
        assert_eq!(
            form["redirect_uri"],
            "http://localhost:3000/api/auth/callback/spotify"
        );
        assert_eq!(form["code_verifier"], "verifier-value");
        assert!(!form.contains_key("client_secret"));
        assert!(auth.as_deref().unwrap().starts_with("Basic "));
    }

    #[tokio::test]
    async fn invalid_grant_surfaces_provider_detail() {
        let (endpoint, captured) = start_token_server(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#,
        )
        .await;

        let err = exchanger_for(&endpoint)
            .exchange("used-code", "verifier")
            .await
            .unwrap_err();

        match err {
            Error::TokenExchangeFailed { detail } => {
                assert!(detail.contains("invalid_grant"), "got: {detail}");
                assert!(detail.contains("Invalid authorization code"));
            }
            other => panic!("expected TokenExchangeFailed, got {other:?}"),
        }
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unstructured_error_body_reports_status() {
        let (endpoint, _) =
            start_token_server(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").await;

        let err = exchanger_for(&endpoint)
            .exchange("code", "verifier")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::exchange("token endpoint returned 500 Internal Server Error")
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_generic_failure() {
        let (endpoint, _) = start_token_server(StatusCode::OK, r#"{"token":"nope"}"#).await;

        let err = exchanger_for(&endpoint)
            .exchange("code", "verifier")
            .await
            .unwrap_err();
        assert_eq!(err, Error::exchange("invalid token response"));
    }

    #[tokio::test]
    async fn non_bearer_token_type_is_rejected() {
        let (endpoint, _) = start_token_server(
            StatusCode::OK,
            r#"{"access_token":"x","token_type":"mac","expires_in":3600}"#,
        )
        .await;

        let err = exchanger_for(&endpoint)
            .exchange("code", "verifier")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "token_exchange_failed");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_generic_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = exchanger_for(&format!("http://{addr}/api/token"))
            .exchange("code", "verifier")
            .await
            .unwrap_err();
        assert_eq!(err, Error::exchange("token endpoint request failed"));
    }
}
