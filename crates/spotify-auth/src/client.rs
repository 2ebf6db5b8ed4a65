//! Client registration settings for the authorization flow

use url::Url;

use crate::constants::{
    AUTHORIZE_ENDPOINT, CALLBACK_PATH, DEFAULT_LANDING_PATH, DEFAULT_POST_LOGIN_PATH, SCOPES,
    TOKEN_ENDPOINT,
};
use crate::error::{Error, Result};

/// Public half of the OAuth client registration plus the app's own routes.
///
/// Endpoints default to Spotify's and can be overridden (tests point them at
/// local mock servers). The client secret is deliberately not part of this
/// struct; it lives only in the token exchanger.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub redirect_uri: Url,
    pub authorize_endpoint: Url,
    pub token_endpoint: Url,
    pub scopes: Vec<String>,
    /// Location after a successful callback
    pub post_login_path: String,
    /// Location for failures (with `?error=`) and after logout
    pub landing_path: String,
}

impl ClientConfig {
    /// Build a config for `client_id`, deriving the redirect URI from the
    /// app's public base URL (`{app_url}/api/auth/callback/spotify`).
    pub fn new(client_id: impl Into<String>, app_url: &str) -> Result<Self> {
        let redirect_uri = format!("{}{}", app_url.trim_end_matches('/'), CALLBACK_PATH);
        Ok(Self {
            client_id: client_id.into(),
            redirect_uri: parse_url("redirect_uri", &redirect_uri)?,
            authorize_endpoint: parse_url("authorize_endpoint", AUTHORIZE_ENDPOINT)?,
            token_endpoint: parse_url("token_endpoint", TOKEN_ENDPOINT)?,
            scopes: SCOPES.iter().map(|s| (*s).to_string()).collect(),
            post_login_path: DEFAULT_POST_LOGIN_PATH.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
        })
    }

    /// Override the authorize endpoint.
    pub fn with_authorize_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.authorize_endpoint = parse_url("authorize_endpoint", endpoint)?;
        Ok(self)
    }

    /// Override the token endpoint.
    pub fn with_token_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.token_endpoint = parse_url("token_endpoint", endpoint)?;
        Ok(self)
    }

    /// Scope parameter value: the scope list joined by spaces.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    /// Landing location carrying a machine-readable error code.
    pub fn landing_with_error(&self, code: &str) -> String {
        let separator = if self.landing_path.contains('?') { '&' } else { '?' };
        format!("{}{separator}error={code}", self.landing_path)
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|e| Error::Config(format!("{field} {value:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_is_app_url_plus_callback_path() {
        let config = ClientConfig::new("client-123", "http://localhost:3000/").unwrap();
        assert_eq!(
            config.redirect_uri.as_str(),
            "http://localhost:3000/api/auth/callback/spotify"
        );
        assert_eq!(config.authorize_endpoint.as_str(), AUTHORIZE_ENDPOINT);
        assert_eq!(config.token_endpoint.as_str(), TOKEN_ENDPOINT);
    }

    #[test]
    fn scope_param_is_space_joined() {
        let config = ClientConfig::new("client-123", "http://localhost:3000").unwrap();
        assert_eq!(
            config.scope_param(),
            "user-read-private user-read-email streaming user-read-playback-state"
        );
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let err = ClientConfig::new("client-123", "http://localhost:3000")
            .unwrap()
            .with_token_endpoint("ftp://accounts.example.com/token")
            .unwrap_err();
        assert_eq!(err.code(), "invalid_config");
    }

    #[test]
    fn unparseable_app_url_is_rejected() {
        assert!(ClientConfig::new("client-123", "localhost:3000").is_err());
    }

    #[test]
    fn landing_with_error_appends_code() {
        let mut config = ClientConfig::new("client-123", "http://localhost:3000").unwrap();
        assert_eq!(config.landing_with_error("no_code"), "/?error=no_code");
        config.landing_path = "/?study=a".into();
        assert_eq!(config.landing_with_error("no_code"), "/?study=a&error=no_code");
    }
}
