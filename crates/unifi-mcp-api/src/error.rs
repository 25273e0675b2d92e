use thiserror::Error;

/// Top-level error type for the `unifi-mcp-api` crate.
///
/// Covers every way a controller call can fail: configuration, login,
/// session expiry, HTTP status, transport, and payload decoding.
/// The tool layer turns these into `{error, data}` payloads via
/// [`ToolPayload`](crate::ToolPayload).
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// A required connection setting is missing or malformed.
    #[error("Invalid configuration for {field}: {reason}")]
    Configuration { field: String, reason: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Every login strategy was rejected by the controller.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The controller answered 401 mid-session. `body` holds at most
    /// 200 characters of the response.
    #[error("Session expired (HTTP 401): {body}")]
    SessionExpired { body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Non-2xx response. `body` holds at most 200 characters.
    #[error("Request failed (HTTP {status}): {body}")]
    Request { status: u16, body: String },

    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The session was shut down; no further calls are accepted.
    #[error("Session is closed")]
    Closed,
}

impl Error {
    /// Returns `true` if the retry policy should try the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired { .. } | Self::Request { .. } | Self::Transport(_)
        )
    }

    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => Some(*status),
            Self::SessionExpired { .. } => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Truncate a response body for error context.
pub(crate) fn body_snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
