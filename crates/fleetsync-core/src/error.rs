// ── Core error types ──
//
// User-facing errors from fleetsync-core. Consumers never match on HTTP
// bodies or socket failures directly: the `From<fleetsync_api::Error>`
// impl folds wire-level failures into the variants below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach fleet backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Fleet backend did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Push channel is closed")]
    ChannelClosed,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed vehicle fragment: {reason}")]
    MalformedFragment { reason: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the next natural poll or reconnect might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::ChannelClosed => true,
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetsync_api::Error> for CoreError {
    fn from(err: fleetsync_api::Error) -> Self {
        match err {
            fleetsync_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            fleetsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            fleetsync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            fleetsync_api::Error::Http { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            fleetsync_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            fleetsync_api::Error::WebSocketClosed { code, reason } => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("WebSocket closed (code {code}): {reason}"),
                }
            }
            fleetsync_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
