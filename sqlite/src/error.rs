//! Error types for SQLite tree storage.

use thiserror::Error;

/// Errors that can occur during SQLite tree operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Stored row that cannot be turned back into a tree value.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Migration lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),

    /// Requested tree was not found.
    #[error("tree not found: {0}")]
    TreeNotFound(String),

    /// Workbook source could not be loaded for seeding.
    #[error("loader error: {0}")]
    LoaderError(#[from] sheet_tree_db::DatabaseError),

    /// Rebuilding a stored tree violated the sink contract.
    #[error("tree rebuild error: {0}")]
    SinkError(#[from] sheet_tree_core::SinkError),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
