//! SQLite storage backend for sheet trees.
//!
//! This crate stores a [`DataTree`](sheet_tree_core::DataTree) in normalized
//! SQLite tables and rebuilds it through the
//! [`TreeSink`](sheet_tree_core::TreeSink) contract, so a loaded tree is
//! equal to the one that was saved.
//!
//! # Architecture
//!
//! - **`schema`**: SQL generation with customizable table prefixes
//! - **`migration`**: lifecycle operations (up/down/seed/refresh/status)
//! - **`convert`**: tree to row transformations and replay
//! - **`query`**: runtime tree access (save, load, lookup, delete)
//!
//! # Quick start
//!
//! ```no_run
//! use sheet_tree_sqlite::{Migration, TreeQuery};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("trees.db").unwrap();
//! let mut migration = Migration::new(conn, "st_").unwrap();
//! migration.up().unwrap();
//! migration.seed("shop", "exports/shop/").unwrap();
//!
//! let conn = migration.into_connection();
//! let query = TreeQuery::new(&conn, "st_").unwrap();
//! if let Some(id) = query.find_branch("shop", "Users", "id", "u1").unwrap() {
//!     for field in query.branch_fields(id).unwrap() {
//!         println!("{} = {}", field.name, field.value.to_text());
//!     }
//! }
//! ```
//!
//! All table and index names carry a configurable prefix, so several
//! isolated tree sets can share one database file. Prefixes must contain
//! only alphanumeric characters and underscores.

mod convert;
mod error;
mod migration;
mod query;
mod schema;

pub use convert::InsertCounts;
pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus, SeedReport};
pub use query::TreeQuery;
pub use schema::{generate_drop_sql, generate_schema_sql};
