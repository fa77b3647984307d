//! Error types for workbook loading and artifact operations.

use thiserror::Error;

/// Errors that can occur while loading sources or writing artifacts.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Source document parsed but does not describe a workbook.
    #[error("invalid workbook: {0}")]
    InvalidWorkbook(String),

    /// Recorded and recomputed artifact checksums differ.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    /// Gzip compression or decompression failure.
    #[error("compression error: {0}")]
    CompressionError(String),
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
