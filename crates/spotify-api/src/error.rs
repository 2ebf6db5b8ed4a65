//! Error types for authenticated API calls

/// Failures from calls to the Spotify Web API.
///
/// All of these are recoverable from the caller's point of view: the page
/// decides whether to send the participant back through login or fall back.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No token in the session, or Spotify answered 401. The session should
    /// be cleared and authorization restarted.
    #[error("not authenticated with Spotify")]
    Unauthenticated,

    #[error("Spotify API returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Spotify API request failed: {0}")]
    Transport(String),

    /// A 2xx body that does not match the expected schema
    #[error("unexpected Spotify API response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Upstream { .. } => "upstream_error",
            ApiError::Transport(_) => "transport_error",
            ApiError::Decode(_) => "decode_error",
        }
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display_includes_status_and_body() {
        let err = ApiError::Upstream {
            status: 404,
            body: r#"{"error":{"status":404,"message":"Device not found"}}"#.into(),
        };
        let display = err.to_string();
        assert!(display.contains("404"));
        assert!(display.contains("Device not found"));
        assert_eq!(err.kind(), "upstream_error");
    }

    #[test]
    fn debug_includes_variant_name() {
        let debug = format!("{:?}", ApiError::Transport("connection refused".into()));
        assert!(debug.contains("Transport"), "got: {debug}");
    }
}
