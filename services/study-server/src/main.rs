//! Mood Study server
//!
//! Single-binary service for the mood-music study:
//! 1. Runs the Spotify sign-in flow (Authorization Code + PKCE)
//! 2. Keeps the participant's bearer token in the session
//! 3. Proxies the handful of Web API calls the study pages make

mod api;
mod auth;
mod config;
mod cookies;
mod error;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use spotify_api::{ApiGateway, SearchRecommender};
use spotify_auth::HttpTokenExchanger;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{ApiState, build_api_router};
use crate::auth::{AuthState, build_auth_router};
use crate::config::Config;
use crate::cookies::CookiePolicy;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// State for the operational endpoints
#[derive(Clone)]
struct AppState {
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Assemble the full application: operational endpoints plus the auth and
/// API routers, behind a concurrency limit of `max_connections`.
fn build_router(state: AppState, auth: AuthState, api: ApiState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(build_auth_router(auth))
        .merge(build_api_router(api))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting mood-study-server");

    let prometheus_handle = metrics::install_recorder();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let client_config = config.client_config()?;
    let client_secret = config
        .spotify
        .client_secret
        .clone()
        .context("client secret missing after config validation")?;

    info!(
        listen_addr = %config.server.listen_addr,
        redirect_uri = %client_config.redirect_uri,
        api_base_url = %config.spotify.api_base_url,
        secure_cookies = config.server.secure_cookies,
        "configuration loaded"
    );
    if !config.server.secure_cookies {
        warn!("secure_cookies is off; only use this for local development over http");
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let policy = CookiePolicy {
        secure: config.server.secure_cookies,
    };
    let exchanger = HttpTokenExchanger::new(http_client.clone(), client_config.clone(), client_secret);
    let auth_state = AuthState::new(client_config, Arc::new(exchanger), policy);
    let api_state = ApiState::new(
        ApiGateway::new(http_client, config.spotify.api_base_url.clone()),
        Arc::new(SearchRecommender),
        policy,
    );
    let app_state = AppState {
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, auth_state, api_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus text exposition format
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use common::Secret;
    use spotify_auth::ClientConfig;
    use tower::ServiceExt;

    /// Handle backed by a recorder that is never installed globally.
    fn test_prometheus_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    /// Full app with outbound calls pointed at an unroutable address.
    fn test_app() -> Router {
        let client_config = ClientConfig::new("test-client", "http://localhost:3000").unwrap();
        let exchanger = HttpTokenExchanger::new(
            reqwest::Client::new(),
            client_config.clone(),
            Secret::new("secret".to_string()),
        );
        let policy = CookiePolicy::default();
        build_router(
            AppState {
                started_at: Instant::now(),
                prometheus: test_prometheus_handle(),
            },
            AuthState::new(client_config, Arc::new(exchanger), policy),
            ApiState::new(
                ApiGateway::new(reqwest::Client::new(), "http://127.0.0.1:1/v1"),
                Arc::new(SearchRecommender),
                policy,
            ),
            64,
        )
    }

    fn request_to(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_json() {
        let response = test_app().oneshot(request_to("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn metrics_endpoint_uses_text_exposition() {
        let response = test_app().oneshot(request_to("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn auth_and_api_routes_are_mounted() {
        let app = test_app();

        let login = app.clone().oneshot(request_to("/api/auth/login")).await.unwrap();
        assert_eq!(login.status(), StatusCode::SEE_OTHER);

        let session = app.clone().oneshot(request_to("/api/auth/session")).await.unwrap();
        assert_eq!(session.status(), StatusCode::OK);

        let me = app.clone().oneshot(request_to("/api/me")).await.unwrap();
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

        let unknown = app.oneshot(request_to("/api/unknown")).await.unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logout_requires_post() {
        let response = test_app().oneshot(request_to("/api/auth/logout")).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
