//! Authenticated Spotify routes
//!
//! Every handler reads the bearer token from the session (the
//! `spotify_access_token` cookie), makes one gateway call and maps the result
//! to JSON. When Spotify says the token is no good the cookie is removed so
//! the page sends the participant back through sign-in.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use spotify_api::{ApiError, ApiGateway, AuthorizedGateway, Recommender};
use spotify_auth::{DualHorizonStore, MemoryHorizon, TokenStore};
use tracing::{debug, warn};

use crate::cookies::{CookieHorizon, CookiePolicy};
use crate::error::{api_error_response, error_response, request_id};
use crate::metrics;

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    gateway: ApiGateway,
    recommender: Arc<dyn Recommender>,
    policy: CookiePolicy,
}

impl ApiState {
    pub fn new(gateway: ApiGateway, recommender: Arc<dyn Recommender>, policy: CookiePolicy) -> Self {
        Self {
            gateway,
            recommender,
            policy,
        }
    }
}

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/search", get(search))
        .route("/api/recommend", get(recommend))
        .route("/api/player/devices", get(devices))
        .route("/api/player/transfer", put(transfer))
        .route("/api/player/play", put(play))
        .with_state(state)
}

/// Run one authenticated call and turn the outcome into a response.
async fn call_api<T, F, Fut>(
    state: &ApiState,
    jar: CookieJar,
    endpoint: &'static str,
    call: F,
) -> Response
where
    T: IntoResponse,
    F: FnOnce(AuthorizedGateway) -> Fut,
    Fut: Future<Output = spotify_api::Result<T>>,
{
    let started = Instant::now();
    let mut store = DualHorizonStore::new(MemoryHorizon::new(), CookieHorizon::new(jar, state.policy));

    let result = match state.gateway.authorize(&mut store) {
        Ok(api) => call(api).await,
        Err(e) => Err(e),
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_api_call(endpoint, outcome, started.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            debug!(endpoint, "Spotify API call succeeded");
            value.into_response()
        }
        Err(err) => {
            let request_id = request_id();
            warn!(request_id = %request_id, endpoint, kind = err.kind(), error = %err, "Spotify API call failed");
            if matches!(err, ApiError::Unauthenticated) {
                store.clear_token();
            }
            let (_, cookies) = store.into_parts();
            (cookies.into_jar(), api_error_response(&err, &request_id)).into_response()
        }
    }
}

fn bad_request(message: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "invalid_request",
        message,
        &request_id(),
    )
}

/// GET /api/me
async fn me(State(state): State<ApiState>, jar: CookieJar) -> Response {
    call_api(&state, jar, "me", |api| async move {
        api.current_user().await.map(Json)
    })
    .await
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<u32>,
}

/// GET /api/search?q=&limit=
async fn search(
    State(state): State<ApiState>,
    jar: CookieJar,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };
    let Some(query) = params.q.filter(|q| !q.trim().is_empty()) else {
        return bad_request("query parameter `q` is required");
    };
    let limit = params.limit.unwrap_or(1);

    call_api(&state, jar, "search", |api| async move {
        let tracks = api.search_tracks(&query, limit).await?;
        Ok(Json(serde_json::json!({ "tracks": tracks })))
    })
    .await
}

#[derive(Debug, Deserialize)]
struct RecommendParams {
    mood: Option<String>,
}

/// GET /api/recommend?mood=
async fn recommend(
    State(state): State<ApiState>,
    jar: CookieJar,
    Query(params): Query<RecommendParams>,
) -> Response {
    let Some(mood) = params.mood else {
        return bad_request("query parameter `mood` is required");
    };
    let recommender = state.recommender.clone();

    call_api(&state, jar, "recommend", |api| async move {
        let found = recommender.recommend(&api, &mood).await?;
        Ok(match found {
            Some(recommendation) => Json(recommendation).into_response(),
            None => error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                "no track matches this mood",
                &request_id(),
            ),
        })
    })
    .await
}

/// GET /api/player/devices
async fn devices(State(state): State<ApiState>, jar: CookieJar) -> Response {
    call_api(&state, jar, "devices", |api| async move {
        let devices = api.devices().await?;
        Ok(Json(serde_json::json!({ "devices": devices })))
    })
    .await
}

#[derive(Debug, Deserialize)]
struct TransferBody {
    device_id: String,
    #[serde(default)]
    play: bool,
}

/// PUT /api/player/transfer
async fn transfer(
    State(state): State<ApiState>,
    jar: CookieJar,
    body: Result<Json<TransferBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };
    if body.device_id.is_empty() {
        return bad_request("`device_id` must not be empty");
    }

    call_api(&state, jar, "transfer", |api| async move {
        api.transfer_playback(&body.device_id, body.play).await?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

#[derive(Debug, Deserialize)]
struct PlayBody {
    device_id: String,
    #[serde(default)]
    uris: Vec<String>,
}

/// PUT /api/player/play
async fn play(
    State(state): State<ApiState>,
    jar: CookieJar,
    body: Result<Json<PlayBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };
    if body.device_id.is_empty() {
        return bad_request("`device_id` must not be empty");
    }

    call_api(&state, jar, "play", |api| async move {
        api.play(&body.device_id, &body.uris).await?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}
