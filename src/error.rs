//! Error types for limpiar.

use std::path::PathBuf;

/// Result type alias for limpiar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in limpiar operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// The path where the error occurred, if known.
        path: Option<PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Arrow error during data processing.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Column not found in the dataset.
    #[error("Column '{name}' not found in dataset")]
    ColumnNotFound {
        /// The name of the missing column.
        name: String,
    },

    /// A replacement or added column does not match the dataset row count.
    #[error("Shape mismatch: expected {expected} rows, got {actual}")]
    ShapeMismatch {
        /// The dataset row count.
        expected: usize,
        /// The offending column length.
        actual: usize,
    },

    /// Loader failure (collaborator I/O).
    #[error("Load error: {message}")]
    Load {
        /// Description of the load failure.
        message: String,
    },

    /// Exporter failure (collaborator I/O).
    #[error("Export error: {message}")]
    Export {
        /// Description of the export failure.
        message: String,
    },

    /// Unsupported file format or extension.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// The unsupported format name or extension.
        format: String,
    },

    /// Empty dataset error.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// No dataset has been bound to the component.
    #[error("No dataset has been provided")]
    NoData,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Cleaning operation error.
    #[error("Transform error: {message}")]
    Transform {
        /// Description of the transform error.
        message: String,
    },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },
}

impl Error {
    /// Create an I/O error with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Create a column not found error.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound { name: name.into() }
    }

    /// Create a load error.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    /// Create an export error.
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a transform error.
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io(io_err, "/path/to/file");
        assert!(err.to_string().contains("/path/to/file"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_column_not_found() {
        let err = Error::column_not_found("my_column");
        assert!(err.to_string().contains("my_column"));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = Error::ShapeMismatch {
            expected: 10,
            actual: 7,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_load_error() {
        let err = Error::load("truncated header");
        assert!(err.to_string().contains("truncated header"));
    }

    #[test]
    fn test_export_error() {
        let err = Error::export("disk full");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_unsupported_format() {
        let err = Error::unsupported_format("xlsx");
        assert!(err.to_string().contains("xlsx"));
    }

    #[test]
    fn test_empty_dataset() {
        let err = Error::EmptyDataset;
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_no_data() {
        let err = Error::NoData;
        assert!(err.to_string().contains("No dataset"));
    }

    #[test]
    fn test_invalid_config() {
        let err = Error::invalid_config("multiplier must be non-negative");
        assert!(err.to_string().contains("multiplier must be non-negative"));
    }

    #[test]
    fn test_transform_error() {
        let err = Error::transform("cannot drop every column");
        assert!(err.to_string().contains("cannot drop every column"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::parse("invalid date literal");
        assert!(err.to_string().contains("invalid date literal"));
    }
}
