//! Spotify OAuth constants
//!
//! Endpoints and names shared by the authorization flow, the token store and
//! the HTTP service. None of these are secrets. The client secret is loaded
//! out of band by the service and never appears here.

/// Authorization endpoint the browser is sent to for consent
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for the server-side code exchange
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Path the provider redirects back to. The redirect URI registered with
/// Spotify is the app URL followed by this path.
pub const CALLBACK_PATH: &str = "/api/auth/callback/spotify";

/// Scopes requested at authorization time.
/// This is the minimum downstream pages need (profile, playback via the Web
/// Playback SDK, device state). Adding a scope widens every participant's
/// consent screen, so treat changes here as reviewed changes.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "streaming",
    "user-read-playback-state",
];

/// Cookie name for the access token. The client-side cache uses the same
/// key, so the two must never diverge.
pub const ACCESS_TOKEN_COOKIE: &str = "spotify_access_token";

/// Cookie name for the pending authorization attempt (state + verifier)
pub const PENDING_AUTH_COOKIE: &str = "spotify_pending_auth";

/// Lifetime of a Spotify access token, and the max-age of the token cookie
pub const TOKEN_LIFETIME_SECS: u64 = 3600;

/// Max-age of the pending authorization cookie. Long enough for a participant
/// to read the consent screen, short enough that an abandoned attempt dies.
pub const PENDING_AUTH_MAX_AGE_SECS: u64 = 600;

/// Length of the PKCE code verifier generated per attempt
pub const VERIFIER_LENGTH: usize = 128;

/// Length of the anti-CSRF state generated per attempt
pub const STATE_LENGTH: usize = 32;

/// Where the browser lands after a successful login
pub const DEFAULT_POST_LOGIN_PATH: &str = "/mood";

/// Where the browser lands after a failed login or logout
pub const DEFAULT_LANDING_PATH: &str = "/";
