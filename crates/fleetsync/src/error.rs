//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use fleetsync_config::ConfigError;
use fleetsync_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const UNHEALTHY: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the fleet backend at {url}: {reason}")]
    #[diagnostic(
        code(fleetsync::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             Override the address with --api-url or FLEETSYNC_API_URL."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(fleetsync::timeout),
        help("Increase the timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(fleetsync::not_found),
        help("Run: fleetsync {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Backend reports status '{status}'")]
    #[diagnostic(code(fleetsync::unhealthy))]
    Unhealthy { status: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error{}: {message}", .status.map_or_else(String::new, |s| format!(" ({s})")))]
    #[diagnostic(code(fleetsync::api_error))]
    ApiError { status: Option<u16>, message: String },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetsync::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(fleetsync::no_config),
        help("Pass an existing file with --config, or omit it to use defaults.")
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fleetsync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Unhealthy { .. } => exit_code::UNHEALTHY,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::ChannelClosed => Self::ConnectionFailed {
                url: "(push channel)".into(),
                reason: "push channel closed".into(),
            },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Api { message, status } => Self::ApiError { status, message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::MalformedFragment { reason } => Self::ApiError {
                status: None,
                message: reason,
            },
            CoreError::Internal(message) => Self::ApiError {
                status: None,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let timeout: CliError = CoreError::Timeout { timeout_secs: 10 }.into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let down: CliError = CoreError::ConnectionFailed {
            url: "http://localhost:5000".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(down.exit_code(), exit_code::CONNECTION);

        let invalid: CliError = ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be greater than zero".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);
        assert!(invalid.to_string().contains("timeout"));
    }

    #[test]
    fn api_error_shows_status_when_known() {
        let err: CliError = CoreError::Api {
            message: "boom".into(),
            status: Some(503),
        }
        .into();
        assert_eq!(err.to_string(), "API error (503): boom");
    }
}
