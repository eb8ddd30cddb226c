//! Error types for vigilar.

use std::path::PathBuf;

/// Result type alias for vigilar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fitting or running drift and quality
/// calculations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error while reading configuration files.
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

    /// Invalid arguments, such as an unknown method key or an unsupported
    /// feature type.
    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        /// Description of the invalid argument.
        message: String,
    },

    /// Column not found in schema.
    #[error("Column '{name}' not found in schema")]
    ColumnNotFound {
        /// The name of the missing column.
        name: String,
    },

    /// Empty dataset error.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// A statistic was requested on a column without any non-missing value.
    #[error("Column '{column}' contains no non-missing values")]
    EmptyColumn {
        /// The name of the column.
        column: String,
    },

    /// Schema mismatch between datasets or batches.
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the schema mismatch.
        message: String,
    },

    /// Chunking failed.
    #[error("Chunker error: {message}")]
    Chunker {
        /// Description of the chunking error.
        message: String,
    },

    /// Statistical computation failed.
    #[error("Statistics error: {message}")]
    Statistics {
        /// Description of the statistics error.
        message: String,
    },

    /// Configuration parse error.
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

    /// Create an invalid arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a column not found error.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound { name: name.into() }
    }

    /// Create an empty column error.
    pub fn empty_column(column: impl Into<String>) -> Self {
        Self::EmptyColumn {
            column: column.into(),
        }
    }

    /// Create a schema mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Create a chunker error.
    pub fn chunker(message: impl Into<String>) -> Self {
        Self::Chunker {
            message: message.into(),
        }
    }

    /// Create a statistics error.
    pub fn statistics(message: impl Into<String>) -> Self {
        Self::Statistics {
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
