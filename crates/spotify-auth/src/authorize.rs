//! Authorization initiation
//!
//! Starts an attempt: fresh PKCE pair and state, persisted as the single
//! pending attempt for this browser session, then a top-level navigation to
//! Spotify's consent page.
//!
//! All browser-side effects go through [`Platform`], so the flow runs the
//! same way behind the HTTP service (cookies + redirects) and in tests
//! ([`MemoryPlatform`]).

use tracing::{debug, info};
use url::Url;

use crate::client::ClientConfig;
use crate::pkce::{self, MAX_VERIFIER_LENGTH, MIN_VERIFIER_LENGTH, PkcePair};

/// The (verifier, state) tuple in flight between initiation and callback.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub verifier: String,
    pub state: String,
}

impl PendingAuthorization {
    /// Serialize for single-value storage such as a cookie: `state.verifier`.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.state, self.verifier)
    }

    /// Parse a stored value. Anything that could not have been produced by
    /// [`encode`](Self::encode) yields `None`, which the callback treats the
    /// same as a missing attempt.
    pub fn decode(raw: &str) -> Option<Self> {
        let (state, verifier) = raw.split_once('.')?;
        if !pkce::is_alphanumeric_token(state) || !pkce::is_alphanumeric_token(verifier) {
            return None;
        }
        if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&verifier.len()) {
            return None;
        }
        Some(Self {
            verifier: verifier.to_string(),
            state: state.to_string(),
        })
    }
}

impl std::fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// Browser capabilities the flow needs.
///
/// Implementations decide where the pending attempt lives (a cookie in the
/// service) and what navigation means (a redirect or hand-off page).
pub trait Platform {
    /// Store `pending` as the only live attempt, replacing any previous one.
    fn persist_pending(&mut self, pending: &PendingAuthorization);

    /// The live attempt, if one survived the round trip and is well formed.
    fn read_pending(&self) -> Option<PendingAuthorization>;

    /// Discard the live attempt. Must be idempotent.
    fn clear_pending(&mut self);

    /// Send the top-level browsing context to `location`.
    fn navigate(&mut self, location: &str);
}

/// In-memory platform for non-browser harnesses.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    pub pending: Option<PendingAuthorization>,
    pub navigations: Vec<String>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent navigation target.
    pub fn location(&self) -> Option<&str> {
        self.navigations.last().map(String::as_str)
    }
}

impl Platform for MemoryPlatform {
    fn persist_pending(&mut self, pending: &PendingAuthorization) {
        self.pending = Some(pending.clone());
    }

    fn read_pending(&self) -> Option<PendingAuthorization> {
        self.pending.clone()
    }

    fn clear_pending(&mut self) {
        self.pending = None;
    }

    fn navigate(&mut self, location: &str) {
        self.navigations.push(location.to_string());
    }
}

/// Build the authorize URL with every parameter Spotify requires.
pub fn build_authorization_url(config: &ClientConfig, state: &str, challenge: &str) -> Url {
    let mut url = config.authorize_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", config.redirect_uri.as_str())
        .append_pair("scope", &config.scope_param())
        .append_pair("code_challenge_method", "S256")
        .append_pair("code_challenge", challenge)
        .append_pair("state", state);
    url
}

/// Begin an authorization attempt.
///
/// Persists the new pending attempt before navigating, so the verifier is in
/// place by the time the provider redirects back. Any earlier attempt in the
/// same session is overwritten. Returns the URL navigated to.
pub fn begin_authorization(config: &ClientConfig, platform: &mut impl Platform) -> Url {
    let pair = PkcePair::generate();
    let pending = PendingAuthorization {
        verifier: pair.verifier,
        state: pkce::generate_state(),
    };

    platform.persist_pending(&pending);
    debug!(state = %pending.state, "pending authorization persisted");

    let url = build_authorization_url(config, &pending.state, &pair.challenge);
    platform.navigate(url.as_str());
    info!(client_id = %config.client_id, "authorization started");
    url
}
