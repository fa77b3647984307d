//! Contract between the tree builder and a tree-storage engine.
//!
//! Branches are addressed by opaque [`BranchId`] handles. A branch is
//! writable from [`grow_branch`](TreeSink::grow_branch) until
//! [`branch_ready`](TreeSink::branch_ready); afterwards every mutation is
//! rejected with [`SinkError::BranchSealed`]. Builders ready branches in
//! post-order, so a sink may also reject readying a branch whose children
//! are still open.

use serde::Serialize;
use thiserror::Error;

use crate::types::{ColumnDescriptor, Scalar, ScalarType};

/// Handle to one branch inside a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BranchId(pub(crate) usize);

impl BranchId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Sink contract violations.
///
/// These signal a bug in the caller, not bad spreadsheet data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("unknown branch handle {0}")]
    UnknownBranch(usize),
    #[error("branch {0} is ready and can no longer be modified")]
    BranchSealed(usize),
    #[error("branch {branch} has {pending} child branch(es) that are not ready")]
    PendingChildren { branch: usize, pending: usize },
}

/// Convenience alias for results with [`SinkError`].
pub type Result<T> = std::result::Result<T, SinkError>;

/// One typed column declared on a header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
}

/// Typed column declarations for the children of a branch.
///
/// Only scalar columns are declared; nested list and record columns become
/// child branches and carry their own header.
///
/// # Examples
///
/// ```
/// use sheet_tree_core::sink::BranchHeader;
/// use sheet_tree_core::{ColumnDescriptor, ListItem, ScalarType};
///
/// let header = BranchHeader::from_descriptors([
///     &ColumnDescriptor::key("id"),
///     &ColumnDescriptor::list("tags", ListItem::Scalar(ScalarType::String)),
///     &ColumnDescriptor::scalar("qty", ScalarType::Int),
/// ]);
/// assert_eq!(header.columns.len(), 2);
/// assert_eq!(header.columns[1].name, "qty");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchHeader {
    pub columns: Vec<HeaderColumn>,
}

impl BranchHeader {
    pub fn add(&mut self, name: impl Into<String>, scalar_type: ScalarType) {
        self.columns.push(HeaderColumn {
            name: name.into(),
            scalar_type,
        });
    }

    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a ColumnDescriptor>) -> Self {
        let mut header = Self::default();
        for descriptor in descriptors {
            if let Some(scalar_type) = descriptor.scalar_type() {
                header.add(descriptor.name.as_str(), scalar_type);
            }
        }
        header
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Operations the builder needs from a tree-storage engine.
pub trait TreeSink {
    /// The root container every sheet branch hangs from.
    fn root(&self) -> BranchId;

    /// Registers `key` as a lookup key for the children of `branch`.
    fn add_key(&mut self, branch: BranchId, key: &str) -> Result<()>;

    /// Creates an open child branch under `parent`.
    fn grow_branch(&mut self, parent: BranchId) -> Result<BranchId>;

    /// Declares the typed columns of the children of `branch`.
    fn set_header(&mut self, branch: BranchId, header: BranchHeader) -> Result<()>;

    /// Sets a named field, replacing any earlier value of the same name.
    fn set_value(&mut self, branch: BranchId, name: &str, value: Scalar) -> Result<()>;

    /// Appends an unnamed, positional list element.
    fn push_element(&mut self, branch: BranchId, value: Scalar) -> Result<()>;

    /// Marks `branch` ready. It must not be touched afterwards.
    fn branch_ready(&mut self, branch: BranchId) -> Result<()>;

    /// Finds the first child of `parent` whose registered key `key` equals
    /// `value`.
    fn find_branch(&self, parent: BranchId, key: &str, value: &str) -> Option<BranchId>;

    fn has_branch(&self, parent: BranchId, key: &str, value: &str) -> bool {
        self.find_branch(parent, key, value).is_some()
    }

    fn set_hash(&mut self, branch: BranchId, name: &str, value: &str) -> Result<()> {
        self.set_value(branch, name, Scalar::Hash(value.to_string()))
    }

    fn set_int(&mut self, branch: BranchId, name: &str, value: f64) -> Result<()> {
        self.set_value(branch, name, Scalar::Int(value))
    }

    fn set_float(&mut self, branch: BranchId, name: &str, value: f64) -> Result<()> {
        self.set_value(branch, name, Scalar::Float(value))
    }

    fn set_bool(&mut self, branch: BranchId, name: &str, value: bool) -> Result<()> {
        self.set_value(branch, name, Scalar::Bool(value))
    }

    fn set_string(&mut self, branch: BranchId, name: &str, value: &str) -> Result<()> {
        self.set_value(branch, name, Scalar::String(value.to_string()))
    }
}
