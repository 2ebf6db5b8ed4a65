//! Sign-in routes
//!
//! - GET  /api/auth/login             start an attempt, 303 to Spotify
//! - GET  /api/auth/callback/spotify  finish it (hand-off page or error redirect)
//! - POST /api/auth/logout            clear both token horizons
//! - GET  /api/auth/session           `{"authenticated": bool}`

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::CookieJar;
use spotify_auth::{
    CALLBACK_PATH, CallbackParams, ClientConfig, DualHorizonStore, MemoryHorizon, TokenExchanger,
    TokenStore, begin_authorization, handle_callback, reject_callback,
};
use tracing::info;

use crate::cookies::{CookieHorizon, CookiePlatform, CookiePolicy, HandOffHorizon, hand_off_page};
use crate::metrics;

/// Shared state for the sign-in handlers.
#[derive(Clone)]
pub struct AuthState {
    client: Arc<ClientConfig>,
    exchanger: Arc<dyn TokenExchanger>,
    policy: CookiePolicy,
}

impl AuthState {
    pub fn new(
        client: ClientConfig,
        exchanger: Arc<dyn TokenExchanger>,
        policy: CookiePolicy,
    ) -> Self {
        Self {
            client: Arc::new(client),
            exchanger,
            policy,
        }
    }
}

pub fn build_auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/api/auth/login", get(login))
        .route(CALLBACK_PATH, get(callback))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(session))
        .with_state(state)
}

async fn login(State(state): State<AuthState>, jar: CookieJar) -> Response {
    let mut platform = CookiePlatform::new(jar, state.policy);
    let url = begin_authorization(&state.client, &mut platform);
    metrics::record_login();

    let (jar, _) = platform.into_parts();
    (jar, Redirect::to(url.as_str())).into_response()
}

async fn callback(
    State(state): State<AuthState>,
    jar: CookieJar,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let mut platform = CookiePlatform::new(jar.clone(), state.policy);
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            let err = reject_callback(
                &state.client,
                &mut platform,
                spotify_auth::Error::MalformedCallback(rejection.body_text()),
            );
            metrics::record_callback(err.code());
            let (pending_jar, location) = platform.into_parts();
            let location = location.unwrap_or_else(|| state.client.landing_with_error(err.code()));
            return (pending_jar, Redirect::to(&location)).into_response();
        }
    };
    let mut store = DualHorizonStore::new(
        HandOffHorizon::default(),
        CookieHorizon::new(jar, state.policy),
    );

    let result = handle_callback(
        &state.client,
        &params,
        &mut platform,
        state.exchanger.as_ref(),
        &mut store,
    )
    .await;

    let (pending_jar, location) = platform.into_parts();
    let (hand_off, token_cookie) = store.into_parts();
    match result {
        Ok(()) => {
            metrics::record_callback("success");
            let location = location.unwrap_or_else(|| state.client.post_login_path.clone());
            (
                pending_jar,
                token_cookie.into_jar(),
                hand_off_page(&hand_off, &location),
            )
                .into_response()
        }
        Err(e) => {
            metrics::record_callback(e.code());
            let location =
                location.unwrap_or_else(|| state.client.landing_with_error(e.code()));
            (pending_jar, Redirect::to(&location)).into_response()
        }
    }
}

/// Clearing an empty session is a no-op, so this is safe to repeat.
async fn logout(State(state): State<AuthState>, jar: CookieJar) -> Response {
    let mut store = DualHorizonStore::new(
        HandOffHorizon::default(),
        CookieHorizon::new(jar, state.policy),
    );
    store.clear_token();
    info!("participant signed out");

    let (hand_off, token_cookie) = store.into_parts();
    (
        token_cookie.into_jar(),
        hand_off_page(&hand_off, &state.client.landing_path),
    )
        .into_response()
}

async fn session(State(state): State<AuthState>, jar: CookieJar) -> impl IntoResponse {
    let mut store = DualHorizonStore::new(MemoryHorizon::new(), CookieHorizon::new(jar, state.policy));
    axum::Json(serde_json::json!({ "authenticated": store.is_authenticated() }))
}
