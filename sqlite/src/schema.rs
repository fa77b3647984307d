//! SQL schema generation with customizable table prefixes.
//!
//! # Table structure
//!
//! - `{prefix}trees`: one row per saved tree, unique by name
//! - `{prefix}branches`: every branch with parent link, sibling ordinal,
//!   ready flag, and whether a header was declared
//! - `{prefix}branch_keys`: registered lookup key names per branch
//! - `{prefix}header_columns`: typed header declarations per branch
//! - `{prefix}fields`: named fields and unnamed list elements
//!
//! Deleting a tree cascades to every row below it.

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the complete SQL schema for all tables with the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is empty or contains
/// characters other than alphanumerics and underscores.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}trees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS {prefix}branches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tree_id INTEGER NOT NULL,
    parent_id INTEGER,
    ordinal INTEGER NOT NULL,
    ready INTEGER NOT NULL DEFAULT 0,
    has_header INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (tree_id) REFERENCES {prefix}trees(id) ON DELETE CASCADE,
    FOREIGN KEY (parent_id) REFERENCES {prefix}branches(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}branch_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    name TEXT NOT NULL,
    FOREIGN KEY (branch_id) REFERENCES {prefix}branches(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}header_columns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    name TEXT NOT NULL,
    scalar_type TEXT NOT NULL CHECK (scalar_type IN ('Hash', 'Int', 'Float', 'Bool', 'String')),
    FOREIGN KEY (branch_id) REFERENCES {prefix}branches(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    name TEXT,
    kind TEXT NOT NULL CHECK (kind IN ('Hash', 'Int', 'Float', 'Bool', 'String')),
    text_value TEXT,
    number_value REAL,
    FOREIGN KEY (branch_id) REFERENCES {prefix}branches(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_{prefix}branches_tree ON {prefix}branches(tree_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}branches_parent ON {prefix}branches(parent_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_{prefix}branch_keys_branch ON {prefix}branch_keys(branch_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}header_columns_branch ON {prefix}header_columns(branch_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}fields_branch ON {prefix}fields(branch_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}fields_lookup ON {prefix}fields(name, text_value);
"#,
        prefix = prefix
    );

    Ok(sql)
}

/// Generates SQL to drop all tables in reverse dependency order.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
DROP TABLE IF EXISTS {prefix}fields;
DROP TABLE IF EXISTS {prefix}header_columns;
DROP TABLE IF EXISTS {prefix}branch_keys;
DROP TABLE IF EXISTS {prefix}branches;
DROP TABLE IF EXISTS {prefix}trees;
"#,
        prefix = prefix
    );

    Ok(sql)
}
