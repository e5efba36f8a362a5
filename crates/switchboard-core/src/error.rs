//! Error types shared across the routing core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid or missing session token")]
    Unauthorized,

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("completion engine error: {0}")]
    Engine(String),

    #[error("engine reported unknown agent: {0}")]
    UnknownAgent(String),

    #[error("max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),

    #[error("agent registry error: {0}")]
    Registry(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The model API answered with a body that is not JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that originate in the completion engine rather than
    /// in the caller's request.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Error::Engine(_)
                | Error::UnknownAgent(_)
                | Error::MaxTurnsExceeded(_)
                | Error::Http(_)
                | Error::Json(_)
        )
    }
}
