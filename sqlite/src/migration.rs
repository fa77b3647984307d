//! Migration lifecycle operations for the SQLite tables.
//!
//! Provides [`Migration`] for creating, dropping, seeding, and refreshing
//! the normalized table structure. All mutation operations use transactions
//! to ensure atomicity.
//!
//! # Example
//!
//! ```no_run
//! use sheet_tree_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("trees.db").unwrap();
//! let mut migration = Migration::new(conn, "st_").unwrap();
//!
//! migration.up().unwrap();
//! assert!(migration.status().unwrap().tables_exist);
//!
//! // Build a workbook export and store it as tree "shop"
//! migration.seed("shop", "exports/shop.json").unwrap();
//! ```

use std::path::Path;

use rusqlite::{Connection, params};
use sheet_tree_core::{DataTree, GrowOptions, grow_tree};
use sheet_tree_db::WorkbookLoader;
use tracing::{debug, info};

use crate::convert;
use crate::error::{Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, validate_prefix};

/// Manages the lifecycle of the prefixed tree tables.
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Creates a new migration manager for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Creates all tables and indexes. Safe to call repeatedly.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        debug!(prefix = %self.prefix, "Created tree tables");
        Ok(())
    }

    /// Drops all tables in reverse dependency order. Safe to call when the
    /// tables do not exist.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        debug!(prefix = %self.prefix, "Dropped tree tables");
        Ok(())
    }

    /// Reports whether the tables exist and how many rows they hold.
    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.tables_exist()? {
            return Ok(MigrationStatus::default());
        }
        Ok(MigrationStatus {
            tables_exist: true,
            tree_count: self.count_rows("trees")?,
            branch_count: self.count_rows("branches")?,
            field_count: self.count_rows("fields")?,
        })
    }

    /// Loads a workbook from `source`, grows it into a tree, and stores it
    /// as `name`, replacing any tree of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::LoaderError`] if the source cannot be loaded,
    /// or [`SqliteError::DatabaseError`] if insertion fails.
    pub fn seed(&mut self, name: &str, source: impl AsRef<Path>) -> Result<SeedReport> {
        let workbook = WorkbookLoader::load(source)?;
        let mut tree = DataTree::new();
        let report = grow_tree(&workbook, &mut tree, &GrowOptions::default())?;

        let tx = self.conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {}trees WHERE name = ?1", self.prefix),
            params![name],
        )?;
        let (_, counts) = convert::insert_tree(&tx, &self.prefix, name, &tree)?;
        tx.commit()?;

        info!(
            tree = name,
            sheets = report.sheets.len(),
            branches = counts.branches,
            diagnostics = report.diagnostics.len(),
            "Seeded tree"
        );
        Ok(SeedReport {
            sheets: report.sheets.len(),
            branches_inserted: counts.branches,
            fields_inserted: counts.fields,
            elements_inserted: counts.elements,
            diagnostics: report.diagnostics.len(),
        })
    }

    /// Drops all tables, recreates them, and seeds `name` from `source`.
    pub fn refresh(&mut self, name: &str, source: impl AsRef<Path>) -> Result<SeedReport> {
        self.down()?;
        self.up()?;
        self.seed(name, source)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn tables_exist(&self) -> Result<bool> {
        let table_name = format!("{}trees", self.prefix);
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{table}", self.prefix),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Snapshot of the migration state returned by [`Migration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub tables_exist: bool,
    pub tree_count: usize,
    pub branch_count: usize,
    pub field_count: usize,
}

/// Counts from [`Migration::seed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub sheets: usize,
    pub branches_inserted: usize,
    pub fields_inserted: usize,
    pub elements_inserted: usize,
    /// Diagnostics collected while growing the tree. They do not block the
    /// seed.
    pub diagnostics: usize,
}
