use thiserror::Error;

/// Core error type shared across SpecMint crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema document violates a shape invariant.
    #[error("invalid schema at '{path}': {message}")]
    InvalidSchema { path: String, message: String },
    /// The schema document is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(path: &str, message: impl Into<String>) -> Self {
        let path = if path.is_empty() { "<root>" } else { path };
        Error::InvalidSchema {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by SpecMint crates.
pub type Result<T> = std::result::Result<T, Error>;
