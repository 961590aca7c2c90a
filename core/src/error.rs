use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the index catalog and its persistence layer.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed index file {path}: {reason}")]
    MalformedIndexFile { path: PathBuf, reason: String },

    #[error("metadata file not found: {0}")]
    MissingMetadataFile(PathBuf),

    #[error("metadata encoding error: {0}")]
    MetadataEncoding(#[from] serde_json::Error),

    #[error("catalog loaded from {0} holds final scores only; rebuild it from the articles to add documents")]
    ScoresOnly(PathBuf),

    #[error("binary encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Reserved for a strict query mode; the lenient parser classifies every token.
    #[error("invalid query syntax: {0}")]
    InvalidQuerySyntax(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::MalformedIndexFile { path: path.into(), reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_artifact() {
        let err = IndexError::malformed("idx.words", "truncated key");
        assert_eq!(err.to_string(), "malformed index file idx.words: truncated key");

        let err = IndexError::MissingMetadataFile(PathBuf::from("idx.meta"));
        assert_eq!(err.to_string(), "metadata file not found: idx.meta");
    }
}
