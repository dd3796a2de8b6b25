use thiserror::Error;

/// Top-level error type for the `fleetsync-api` crate.
///
/// Covers every failure mode across both backend surfaces: the REST
/// query interface and the push socket. `fleetsync-core` maps these into
/// domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success HTTP status from the backend.
    #[error("Backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Push socket ─────────────────────────────────────────────────
    /// Push socket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Push socket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            Self::Timeout { .. } | Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }
}
