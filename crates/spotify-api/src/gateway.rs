//! Authenticated access to the Spotify Web API
//!
//! Every call carries `Authorization: Bearer <token>` taken from the
//! session's token store at the time of the call, and every non-2xx answer
//! becomes a typed [`ApiError`]. There is no refresh and no retry: a 401
//! means the participant has to log in again.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use spotify_auth::{AccessToken, TokenStore};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ApiError, Result};
use crate::models::{
    Device, DevicesResponse, PlayRequest, SearchResponse, Track, TransferRequest, UserProfile,
};

/// Spotify Web API base URL
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Largest page Spotify's search endpoint accepts
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// Entry point for API calls. Cheap to clone (the client is reference
/// counted); holds no credentials.
#[derive(Debug, Clone)]
pub struct ApiGateway {
    client: reqwest::Client,
    base_url: String,
}

impl ApiGateway {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Bind the session's current token for a batch of calls.
    ///
    /// Fails with [`ApiError::Unauthenticated`] when the store holds no token,
    /// without touching the network.
    pub fn authorize(&self, store: &mut impl TokenStore) -> Result<AuthorizedGateway> {
        let token = store.get_token().ok_or(ApiError::Unauthenticated)?;
        Ok(self.with_token(token))
    }

    pub fn with_token(&self, token: AccessToken) -> AuthorizedGateway {
        AuthorizedGateway {
            gateway: self.clone(),
            token,
        }
    }
}

/// Gateway bound to one bearer token.
#[derive(Debug)]
pub struct AuthorizedGateway {
    gateway: ApiGateway,
    token: AccessToken,
}

impl AuthorizedGateway {
    /// `GET /search?q=&type=track&limit=`. `limit` is clamped to 1..=50.
    pub async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>> {
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let response: SearchResponse = self
            .get_json(
                "/search",
                &[("q", query), ("type", "track"), ("limit", &limit)],
            )
            .await?;
        Ok(response.tracks.items)
    }

    /// `GET /me/player/devices`
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let response: DevicesResponse = self.get_json("/me/player/devices", &[]).await?;
        Ok(response.devices)
    }

    /// `PUT /me/player`: move playback to `device_id`, optionally starting it.
    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> Result<()> {
        let body = TransferRequest {
            device_ids: [device_id],
            play,
        };
        self.send(Method::PUT, "/me/player", &[], Some(&body))
            .await
            .map(drop)
    }

    /// `PUT /me/player/play?device_id=`: start (or resume) playback of
    /// `uris` on `device_id`. An empty `uris` resumes the current context.
    pub async fn play(&self, device_id: &str, uris: &[String]) -> Result<()> {
        let body = PlayRequest { uris };
        self.send(
            Method::PUT,
            "/me/player/play",
            &[("device_id", device_id)],
            Some(&body),
        )
        .await
        .map(drop)
    }

    /// `GET /me`
    pub async fn current_user(&self) -> Result<UserProfile> {
        self.get_json("/me", &[]).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, query, None).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{path}: {e}")))
    }

    #[instrument(skip_all, fields(method = %method, path = %path))]
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path, query)?;
        let mut request = self
            .gateway
            .client
            .request(method, url)
            .bearer_auth(self.token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, timeout = e.is_timeout(), "Spotify API unreachable");
            ApiError::Transport(if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.without_url().to_string()
            })
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), "Spotify API responded");
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthenticated);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}{path}", self.gateway.base_url.trim_end_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::Transport(format!("invalid API URL {raw}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}
