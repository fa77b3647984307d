//! Workbook sources, build configuration, and tree artifacts.
//!
//! This crate sits on both sides of the core build:
//!
//! - [`WorkbookLoader`] reads a [`Workbook`](sheet_tree_core::Workbook)
//!   from a spreadsheet document with grid data or from a directory of
//!   per-sheet JSON grids.
//! - [`BuildConfig`] is the YAML configuration selecting sheets, output
//!   format, and reference strictness.
//! - [`write_artifact`] writes the finished tree as JSON or gzip and
//!   returns its checksum; [`ArtifactManifest`] records it.
//!
//! # Quick start
//!
//! ```no_run
//! use sheet_tree_core::{DataTree, grow_tree};
//! use sheet_tree_db::{ArtifactManifest, BuildConfig, WorkbookLoader, write_artifact};
//!
//! let config = BuildConfig::load("sheet-tree.yml").unwrap();
//! let workbook = WorkbookLoader::load("exports/shop.json").unwrap();
//!
//! let mut tree = DataTree::new();
//! let report = grow_tree(&workbook, &mut tree, &config.grow_options()).unwrap();
//!
//! let format = config.output.format;
//! let checksum = write_artifact(&tree, "out/shop.json", format).unwrap();
//! ArtifactManifest::new("0.1.0", "shop.json", format, checksum)
//!     .with_report(&report)
//!     .save(ArtifactManifest::path_for("out/shop.json"))
//!     .unwrap();
//! ```

mod artifact;
mod config;
mod error;
mod loader;

pub use artifact::{
    ArtifactFormat, ArtifactManifest, MANIFEST_VERSION, checksum_file, read_artifact,
    write_artifact,
};
pub use config::{BuildConfig, OutputConfig, ReferenceConfig};
pub use error::{DatabaseError, Result};
pub use loader::{WorkbookLoader, WorkbookSource};
