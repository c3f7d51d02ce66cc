//! Error types for crew-runner
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,
    MissingCredentials = 103,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,

    // Generation errors (3xx)
    GenerationFailed = 300,
    AuthenticationFailed = 301,
    NetworkFailure = 302,
    RateLimited = 303,
    MalformedResponse = 304,
    ServerError = 305,

    // Run errors (5xx)
    AlreadyRun = 500,
    NotConfigured = 501,
    DependencyFailed = 502,
    RunIncomplete = 503,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            500..=599 => 50,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a text generation call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailureKind {
    /// Credentials rejected by the endpoint (401/403)
    Authentication,
    /// Connection refused, reset or timed out
    Network,
    /// Quota or rate limit hit (429)
    RateLimited,
    /// Endpoint returned a 5xx
    ServerError,
    /// Response body could not be understood, or carried no text
    MalformedResponse,
    /// Endpoint refused the request for another reason (4xx)
    Rejected,
}

impl fmt::Display for GenerationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationFailureKind::Authentication => "authentication",
            GenerationFailureKind::Network => "network",
            GenerationFailureKind::RateLimited => "rate limit",
            GenerationFailureKind::ServerError => "server error",
            GenerationFailureKind::MalformedResponse => "malformed response",
            GenerationFailureKind::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Invalid configuration or work item definitions
    #[error("Configuration error: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// API key required by the provider is not available
    #[error("Missing credentials: no API key configured and ${env_var} is not set")]
    MissingCredentials { env_var: String },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Generation Errors
    // ─────────────────────────────────────────────────────────────

    /// A single generation call failed
    #[error("Generation failed ({kind}): {reason}")]
    GenerationFailed {
        kind: GenerationFailureKind,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Run Errors
    // ─────────────────────────────────────────────────────────────

    /// The runner has already executed its one run
    #[error("Runner has already been run")]
    AlreadyRun,

    #[error("Runner has no configured work items")]
    NotConfigured,

    /// An upstream work item did not succeed
    #[error("Dependency '{dependency}' did not succeed (status: {status})")]
    DependencyFailed { dependency: String, status: String },

    /// Strict mode: the run finished but some items did not succeed
    #[error("{failed} of {total} work items did not succeed")]
    RunIncomplete { failed: usize, total: usize },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::MissingCredentials { .. } => ErrorCode::MissingCredentials,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::IoWrite,

            Error::GenerationFailed { kind, .. } => match kind {
                GenerationFailureKind::Authentication => ErrorCode::AuthenticationFailed,
                GenerationFailureKind::Network => ErrorCode::NetworkFailure,
                GenerationFailureKind::RateLimited => ErrorCode::RateLimited,
                GenerationFailureKind::ServerError => ErrorCode::ServerError,
                GenerationFailureKind::MalformedResponse => ErrorCode::MalformedResponse,
                GenerationFailureKind::Rejected => ErrorCode::GenerationFailed,
            },

            Error::AlreadyRun => ErrorCode::AlreadyRun,
            Error::NotConfigured => ErrorCode::NotConfigured,
            Error::DependencyFailed { .. } => ErrorCode::DependencyFailed,
            Error::RunIncomplete { .. } => ErrorCode::RunIncomplete,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a generation call that produced this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::GenerationFailed {
                kind: GenerationFailureKind::Network
                    | GenerationFailureKind::RateLimited
                    | GenerationFailureKind::ServerError,
                ..
            }
        )
    }

    /// Whether this error belongs to the configuration group
    pub fn is_configuration(&self) -> bool {
        self.code().exit_code() == 10
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'crew-runner config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'crew-runner config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the [[agents]] and [[tasks]] sections: task names must be unique and non-empty, and context entries must name earlier tasks."
            ),
            Error::MissingCredentials { .. } => Some(
                "Export the API key (e.g. HUGGINGFACE_API_KEY), set CREW_API_KEY, or use '--provider mock' for an offline run."
            ),
            Error::GenerationFailed {
                kind: GenerationFailureKind::Authentication,
                ..
            } => Some("The endpoint rejected the API key. Check that it is valid for the configured base_url."),
            Error::GenerationFailed {
                kind: GenerationFailureKind::RateLimited,
                ..
            } => Some("Quota exhausted. Wait and retry, or raise 'max_retries' in the [llm] section."),
            Error::GenerationFailed {
                kind: GenerationFailureKind::Network,
                ..
            } => Some("Check your network connection and the configured base_url."),
            Error::IoWrite { .. } => Some(
                "Check that the output directory is writable, or pass --output-dir."
            ),
            Error::RunIncomplete { .. } => Some(
                "See the per-task output files for failure reasons."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn generation(kind: GenerationFailureKind, reason: impl Into<String>) -> Self {
        Error::GenerationFailed {
            kind,
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
