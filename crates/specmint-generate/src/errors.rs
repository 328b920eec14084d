use thiserror::Error;

/// Errors emitted by value generation and the pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("unsatisfiable constraints at '{path}': {reason}")]
    Unsatisfiable { path: String, reason: String },
    #[error("failed to generate field '{path}': {source}")]
    Field {
        path: String,
        #[source]
        source: Box<GenerationError>,
    },
    #[error("generation cancelled")]
    Cancelled,
    #[error("enrichment of '{field}' failed: {message}")]
    Enrich { field: String, message: String },
    #[error("worker failed: {0}")]
    Worker(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenerationError {
    pub(crate) fn unsatisfiable(path: &str, reason: impl Into<String>) -> Self {
        GenerationError::Unsatisfiable {
            path: display_path(path),
            reason: reason.into(),
        }
    }

    /// Attach the failing field path, keeping the innermost one when the
    /// error already carries a path.
    pub(crate) fn field(path: &str, source: GenerationError) -> Self {
        match source {
            GenerationError::Field { .. } => source,
            other => GenerationError::Field {
                path: display_path(path),
                source: Box::new(other),
            },
        }
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}
