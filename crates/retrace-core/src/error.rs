//! Error types for retrace.

use thiserror::Error;

/// Result type alias using retrace's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for retrace operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Tag handle does not resolve to a live tag
    #[error("Stale tag handle: document {document}, tag {tag}")]
    StaleHandle { document: usize, tag: usize },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Project file is not a retrace project tree
    #[error("Malformed project file: {0}")]
    MalformedProject(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DocumentNotFound("clip.mov".into());
        assert_eq!(err.to_string(), "Document not found: clip.mov");

        let err = Error::StaleHandle { document: 3, tag: 1 };
        assert!(err.to_string().contains("document 3"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
