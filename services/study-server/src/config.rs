//! Configuration types and loading
//!
//! Precedence: CLI `--config` > `CONFIG_PATH` > `study-server.toml`, then
//! `SPOTIFY_CLIENT_ID` and `APP_URL` override the file. The client secret is
//! read from `SPOTIFY_CLIENT_SECRET` or `client_secret_file` and is never
//! stored in the TOML.

use common::Secret;
use serde::Deserialize;
use spotify_api::API_BASE_URL;
use spotify_auth::{
    AUTHORIZE_ENDPOINT, ClientConfig, DEFAULT_LANDING_PATH, DEFAULT_POST_LOGIN_PATH,
    TOKEN_ENDPOINT,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub server: ServerConfig,
}

/// OAuth client registration and Spotify endpoints
#[derive(Debug, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    /// Public base URL of the app; the redirect URI hangs off it
    pub app_url: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file holding the client secret (alternative to SPOTIFY_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_post_login_path")]
    pub post_login_path: String,
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Mark cookies `Secure`. Required in production (https).
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_authorize_endpoint() -> String {
    AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_api_base_url() -> String {
    API_BASE_URL.to_string()
}

fn default_post_login_path() -> String {
    DEFAULT_POST_LOGIN_PATH.to_string()
}

fn default_landing_path() -> String {
    DEFAULT_LANDING_PATH.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. SPOTIFY_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var("SPOTIFY_CLIENT_ID") {
            config.spotify.client_id = client_id;
        }
        if let Ok(app_url) = std::env::var("APP_URL") {
            config.spotify.app_url = app_url;
        }

        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            config.spotify.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.spotify.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.spotify.client_secret = Some(Secret::new(secret));
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.spotify.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        if self.spotify.client_secret.is_none() {
            return Err(common::Error::Config(
                "client secret missing: set SPOTIFY_CLIENT_SECRET or client_secret_file".into(),
            ));
        }
        if !self.spotify.api_base_url.starts_with("http://")
            && !self.spotify.api_base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api_base_url must start with http:// or https://, got: {}",
                self.spotify.api_base_url
            )));
        }
        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        // app_url and the auth endpoints are checked by the client builder
        self.client_config().map(|_| ())
    }

    /// OAuth client settings for the auth library.
    pub fn client_config(&self) -> common::Result<ClientConfig> {
        let to_config_error = |e: spotify_auth::Error| common::Error::Config(e.to_string());
        let mut client = ClientConfig::new(self.spotify.client_id.clone(), &self.spotify.app_url)
            .and_then(|c| c.with_authorize_endpoint(&self.spotify.authorize_endpoint))
            .and_then(|c| c.with_token_endpoint(&self.spotify.token_endpoint))
            .map_err(to_config_error)?;
        client.post_login_path = self.spotify.post_login_path.clone();
        client.landing_path = self.spotify.landing_path.clone();
        Ok(client)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("study-server.toml")
    }
}
