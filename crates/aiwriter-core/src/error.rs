//! Error taxonomy for the session core.
//!
//! Every variant is recoverable: callers turn it into one visible message and
//! the session stays usable.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Save attempted on a scratch buffer; the caller must ask for a destination.
    #[error("this buffer has no file path yet; choose where to save it")]
    NoPath,

    #[error("no tab at index {0}")]
    NoSuchTab(usize),

    #[error("{0} is already open in another tab")]
    PathAlreadyOpen(String),

    /// Save-as target exists on disk; the caller must confirm the overwrite.
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    /// Transport failed before a structured reply arrived.
    #[error("{0}")]
    Network(String),

    /// Structured `{ "error": ... }` reply from the completion endpoint.
    #[error("{0}")]
    Server(String),

    #[error("no folder is open")]
    NoFolder,

    #[error("a chat request is already pending")]
    RequestPending,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    pub fn io(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SessionError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
