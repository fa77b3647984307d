//! Runtime tree access via SQLite queries.
//!
//! Provides [`TreeQuery`] for saving, loading, and looking up trees stored
//! in the normalized SQLite tables. Saving replaces any tree of the same
//! name inside one transaction, and the cascading foreign keys remove the
//! old rows.
//!
//! # Example
//!
//! ```no_run
//! use sheet_tree_core::DataTree;
//! use sheet_tree_sqlite::TreeQuery;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("trees.db").unwrap();
//! let query = TreeQuery::new(&conn, "st_").unwrap();
//!
//! query.save_tree("shop", &DataTree::new()).unwrap();
//! assert!(query.load_tree("shop").unwrap().is_some());
//!
//! // Row keyed "u1" in sheet "Users"
//! let branch = query.find_branch("shop", "Users", "id", "u1").unwrap();
//! ```

use rusqlite::{Connection, params};
use sheet_tree_core::{DataTree, Field, SHEET_NAME_KEY};
use tracing::debug;

use crate::convert::{self, InsertCounts};
use crate::error::{Result, SqliteError};
use crate::schema::validate_prefix;

/// Query interface for reading and writing trees in SQLite.
///
/// Wraps a borrowed connection and table prefix. Row-level work is
/// delegated to the `convert` module.
pub struct TreeQuery<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> TreeQuery<'a> {
    /// Creates a new query interface for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Stores `tree` under `name`, replacing any existing tree of that name.
    pub fn save_tree(&self, name: &str, tree: &DataTree) -> Result<InsertCounts> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!("DELETE FROM {}trees WHERE name = ?1", self.prefix),
            params![name],
        )?;
        let (tree_id, counts) = convert::insert_tree(&tx, &self.prefix, name, tree)?;
        tx.commit()?;
        debug!(tree = name, id = tree_id, branches = counts.branches, "Saved tree");
        Ok(counts)
    }

    /// Loads the tree saved as `name`, or `None` if there is none.
    pub fn load_tree(&self, name: &str) -> Result<Option<DataTree>> {
        convert::load_tree(self.conn, &self.prefix, name)
    }

    /// Names of all saved trees, sorted.
    pub fn tree_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT name FROM {}trees ORDER BY name", self.prefix))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Deletes the tree saved as `name` together with all of its rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::TreeNotFound`] if no tree has that name.
    pub fn delete_tree(&self, name: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute(
            &format!("DELETE FROM {}trees WHERE name = ?1", self.prefix),
            params![name],
        )?;
        if deleted == 0 {
            return Err(SqliteError::TreeNotFound(name.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    /// Finds the row branch in `sheet` whose key `key` equals `value`.
    ///
    /// Walks root, then the sheet branch tagged with `sheetName`, then the
    /// first row matching the key. Returns `None` when any step misses or
    /// when `key` is not a registered key of the sheet.
    pub fn find_branch(
        &self,
        name: &str,
        sheet: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<i64>> {
        let Some(tree_id) = convert::tree_id(self.conn, &self.prefix, name)? else {
            return Ok(None);
        };
        let Some(root) = convert::root_branch_id(self.conn, &self.prefix, tree_id)? else {
            return Ok(None);
        };
        let Some(sheet_id) =
            convert::find_child(self.conn, &self.prefix, root, SHEET_NAME_KEY, sheet)?
        else {
            return Ok(None);
        };
        convert::find_child(self.conn, &self.prefix, sheet_id, key, value)
    }

    /// Named fields of a stored branch, in insertion order.
    pub fn branch_fields(&self, branch_id: i64) -> Result<Vec<Field>> {
        convert::load_fields(self.conn, &self.prefix, branch_id)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}
