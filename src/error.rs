//! Error types for tskdash
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, unknown tab)
//! - 4: Operation failed (http, io, decode)
//!
//! Feed failures at runtime never surface here: the push feed drops bad
//! messages and the history poll resets its view. These errors only cover
//! startup and one-shot commands.

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tskdash CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tskdash operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Unknown tab '{0}' (expected all|pending|processing|completed|failed|retrying|scheduled)")]
    UnknownTab(String),

    // Operation failures (exit code 4)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed error at {url}: {message}")]
    Feed { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) | Error::ConfigNotFound(_)
            | Error::UnknownTab(_) => exit_codes::USER_ERROR,

            Error::Http(_)
            | Error::Feed { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidConfig(message) => Some(serde_json::json!({ "message": message })),
            Error::ConfigNotFound(path) => {
                Some(serde_json::json!({ "path": path.to_string_lossy() }))
            }
            Error::UnknownTab(tab) => Some(serde_json::json!({ "tab": tab })),
            Error::Feed { url, message } => {
                Some(serde_json::json!({ "url": url, "message": message }))
            }
            Error::Http(err) => err
                .url()
                .map(|url| serde_json::json!({ "url": url.as_str() })),
            _ => None,
        }
    }
}

/// Result type alias for tskdash operations
pub type Result<T> = std::result::Result<T, Error>;
