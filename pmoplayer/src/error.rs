//! Error types for generators and skip providers

/// Errors reported by a [`crate::LinkGenerator`]
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Free-form failure, displayed verbatim
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors reported by a [`crate::SkipStampProvider`]
#[derive(Debug, thiserror::Error)]
pub enum SkipError {
    #[error("Skip detection unavailable: {0}")]
    Unavailable(String),

    #[error("Skip request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, GeneratorError>;
