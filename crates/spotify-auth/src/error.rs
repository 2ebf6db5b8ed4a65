//! Error types for the authorization flow

/// Errors from the authorization flow and token exchange.
///
/// Every variant maps to a stable machine-readable code via [`Error::code`],
/// which the service places in the landing page's `?error=` parameter.
/// Display strings never include token material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    #[error("callback is missing the authorization code")]
    MissingCode,

    #[error("callback is missing the state parameter")]
    MissingState,

    #[error("no pending authorization attempt (verifier missing or unreadable)")]
    MissingVerifier,

    #[error("callback state does not match the pending authorization attempt")]
    StateMismatch,

    /// Query string that could not be read at all (e.g. a repeated parameter)
    #[error("malformed callback query: {0}")]
    MalformedCallback(String),

    #[error("token exchange failed: {detail}")]
    TokenExchangeFailed { detail: String },

    #[error("verifier length {0} is outside 43..=128")]
    InvalidVerifierLength(usize),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl Error {
    /// Machine-readable code for redirect query parameters and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Error::AuthorizationDenied(_) => "authorization_denied",
            Error::MissingCode => "no_code",
            Error::MissingState => "no_state",
            Error::MissingVerifier => "no_verifier",
            Error::StateMismatch => "state_mismatch",
            Error::MalformedCallback(_) => "malformed_callback",
            Error::TokenExchangeFailed { .. } => "token_exchange_failed",
            Error::InvalidVerifierLength(_) => "invalid_verifier_length",
            Error::Config(_) => "invalid_config",
        }
    }

    pub(crate) fn exchange(detail: impl Into<String>) -> Self {
        Error::TokenExchangeFailed {
            detail: detail.into(),
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
