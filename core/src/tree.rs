//! In-memory tree sink.
//!
//! [`DataTree`] stores branches in an arena indexed by [`BranchId`]. It
//! enforces the ready/sealed lifecycle of the sink contract and serializes
//! to a nested JSON document:
//!
//! ```json
//! {
//!   "keys": ["sheetName"],
//!   "fields": {},
//!   "children": [
//!     { "keys": ["id"], "header": [{"name": "id", "type": "Hash"}],
//!       "fields": {"sheetName": "Users"}, "children": [ ... ] }
//!   ]
//! }
//! ```

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::sink::{BranchHeader, BranchId, Result, SinkError, TreeSink};
use crate::types::Scalar;

/// A named value stored on a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Scalar,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Branch {
    parent: Option<usize>,
    keys: Vec<String>,
    header: Option<BranchHeader>,
    fields: Vec<Field>,
    elements: Vec<Scalar>,
    children: Vec<usize>,
    ready: bool,
}

/// Arena-backed tree implementing [`TreeSink`].
///
/// # Examples
///
/// ```
/// use sheet_tree_core::{DataTree, TreeSink};
///
/// let mut tree = DataTree::new();
/// let root = tree.root();
/// tree.add_key(root, "id").unwrap();
/// let child = tree.grow_branch(root).unwrap();
/// tree.set_hash(child, "id", "u1").unwrap();
/// tree.branch_ready(child).unwrap();
///
/// assert!(tree.has_branch(root, "id", "u1"));
/// assert!(tree.set_hash(child, "id", "u2").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DataTree {
    branches: Vec<Branch>,
}

impl Default for DataTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTree {
    /// Creates a tree holding only an open root container.
    pub fn new() -> Self {
        Self {
            branches: vec![Branch::default()],
        }
    }

    /// Number of branches, root included.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.len() == 1
    }

    /// Whether every branch below the root has been readied.
    pub fn is_complete(&self) -> bool {
        self.branches.iter().skip(1).all(|b| b.ready)
    }

    /// Read-only view of a branch.
    pub fn branch(&self, id: BranchId) -> Option<BranchView<'_>> {
        (id.0 < self.branches.len()).then_some(BranchView { tree: self, id })
    }

    /// Read-only view of the root container.
    pub fn root_view(&self) -> BranchView<'_> {
        BranchView {
            tree: self,
            id: BranchId(0),
        }
    }

    fn get(&self, id: BranchId) -> Result<&Branch> {
        self.branches.get(id.0).ok_or(SinkError::UnknownBranch(id.0))
    }

    fn open_mut(&mut self, id: BranchId) -> Result<&mut Branch> {
        let branch = self
            .branches
            .get_mut(id.0)
            .ok_or(SinkError::UnknownBranch(id.0))?;
        if branch.ready {
            return Err(SinkError::BranchSealed(id.0));
        }
        Ok(branch)
    }
}

impl TreeSink for DataTree {
    fn root(&self) -> BranchId {
        BranchId(0)
    }

    fn add_key(&mut self, branch: BranchId, key: &str) -> Result<()> {
        let branch = self.open_mut(branch)?;
        if !branch.keys.iter().any(|k| k == key) {
            branch.keys.push(key.to_string());
        }
        Ok(())
    }

    fn grow_branch(&mut self, parent: BranchId) -> Result<BranchId> {
        self.open_mut(parent)?;
        let id = self.branches.len();
        self.branches.push(Branch {
            parent: Some(parent.0),
            ..Branch::default()
        });
        self.branches[parent.0].children.push(id);
        Ok(BranchId(id))
    }

    fn set_header(&mut self, branch: BranchId, header: BranchHeader) -> Result<()> {
        self.open_mut(branch)?.header = Some(header);
        Ok(())
    }

    fn set_value(&mut self, branch: BranchId, name: &str, value: Scalar) -> Result<()> {
        let branch = self.open_mut(branch)?;
        match branch.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => branch.fields.push(Field {
                name: name.to_string(),
                value,
            }),
        }
        Ok(())
    }

    fn push_element(&mut self, branch: BranchId, value: Scalar) -> Result<()> {
        self.open_mut(branch)?.elements.push(value);
        Ok(())
    }

    fn branch_ready(&mut self, branch: BranchId) -> Result<()> {
        let pending = self
            .get(branch)?
            .children
            .iter()
            .filter(|&&child| !self.branches[child].ready)
            .count();
        if pending > 0 {
            return Err(SinkError::PendingChildren {
                branch: branch.0,
                pending,
            });
        }
        self.open_mut(branch)?.ready = true;
        Ok(())
    }

    fn find_branch(&self, parent: BranchId, key: &str, value: &str) -> Option<BranchId> {
        let parent = self.branches.get(parent.0)?;
        if !parent.keys.iter().any(|k| k == key) {
            return None;
        }
        parent
            .children
            .iter()
            .copied()
            .find(|&child| {
                self.branches[child]
                    .fields
                    .iter()
                    .any(|f| f.name == key && f.value.as_text() == Some(value))
            })
            .map(BranchId)
    }
}

/// Borrowed view of one branch of a [`DataTree`].
#[derive(Debug, Clone, Copy)]
pub struct BranchView<'a> {
    tree: &'a DataTree,
    id: BranchId,
}

impl<'a> BranchView<'a> {
    fn branch(&self) -> &'a Branch {
        &self.tree.branches[self.id.0]
    }

    pub fn id(&self) -> BranchId {
        self.id
    }

    pub fn parent(&self) -> Option<BranchView<'a>> {
        self.branch().parent.map(|p| BranchView {
            tree: self.tree,
            id: BranchId(p),
        })
    }

    pub fn keys(&self) -> &'a [String] {
        &self.branch().keys
    }

    pub fn header(&self) -> Option<&'a BranchHeader> {
        self.branch().header.as_ref()
    }

    pub fn fields(&self) -> &'a [Field] {
        &self.branch().fields
    }

    pub fn field(&self, name: &str) -> Option<&'a Scalar> {
        self.fields().iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn elements(&self) -> &'a [Scalar] {
        &self.branch().elements
    }

    pub fn is_ready(&self) -> bool {
        self.branch().ready
    }

    pub fn children(&self) -> impl Iterator<Item = BranchView<'a>> + 'a {
        let tree = self.tree;
        self.branch().children.iter().map(move |&c| BranchView {
            tree,
            id: BranchId(c),
        })
    }

    /// First child whose field `key` holds `value`, ignoring key
    /// registration.
    pub fn child_where(&self, key: &str, value: &str) -> Option<BranchView<'a>> {
        self.children()
            .find(|c| c.field(key).and_then(Scalar::as_text) == Some(value))
    }
}

struct FieldMap<'a>(&'a [Field]);

impl Serialize for FieldMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

struct Children<'a>(BranchView<'a>);

impl Serialize for Children<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.branch().children.len()))?;
        for child in self.0.children() {
            seq.serialize_element(&child)?;
        }
        seq.end()
    }
}

impl Serialize for BranchView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let branch = self.branch();
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("keys", &branch.keys)?;
        if let Some(ref header) = branch.header {
            map.serialize_entry("header", &header.columns)?;
        }
        map.serialize_entry("fields", &FieldMap(&branch.fields))?;
        if !branch.elements.is_empty() {
            map.serialize_entry("elements", &branch.elements)?;
        }
        map.serialize_entry("children", &Children(*self))?;
        map.end()
    }
}

impl Serialize for DataTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root_view().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;

    #[test]
    fn test_sealed_branch_rejects_mutation() {
        let mut tree = DataTree::new();
        let child = tree.grow_branch(tree.root()).unwrap();
        tree.branch_ready(child).unwrap();

        assert_eq!(tree.set_int(child, "n", 1.0), Err(SinkError::BranchSealed(child.0)));
        assert_eq!(tree.add_key(child, "k"), Err(SinkError::BranchSealed(child.0)));
        assert!(tree.grow_branch(child).is_err());
        assert!(tree.push_element(child, Scalar::Int(1.0)).is_err());
        assert!(tree.branch_ready(child).is_err());
    }

    #[test]
    fn test_ready_requires_children_ready_first() {
        let mut tree = DataTree::new();
        let parent = tree.grow_branch(tree.root()).unwrap();
        let child = tree.grow_branch(parent).unwrap();

        assert!(matches!(
            tree.branch_ready(parent),
            Err(SinkError::PendingChildren { pending: 1, .. })
        ));
        tree.branch_ready(child).unwrap();
        tree.branch_ready(parent).unwrap();
        assert!(tree.is_complete());
    }

    #[test]
    fn test_unknown_branch() {
        let mut tree = DataTree::new();
        assert_eq!(tree.set_hash(BranchId(9), "a", "b"), Err(SinkError::UnknownBranch(9)));
    }

    #[test]
    fn test_find_branch_first_match_wins_and_needs_registered_key() {
        let mut tree = DataTree::new();
        let root = tree.root();
        let first = tree.grow_branch(root).unwrap();
        tree.set_hash(first, "id", "dup").unwrap();
        let second = tree.grow_branch(root).unwrap();
        tree.set_hash(second, "id", "dup").unwrap();

        assert_eq!(tree.find_branch(root, "id", "dup"), None);
        tree.add_key(root, "id").unwrap();
        assert_eq!(tree.find_branch(root, "id", "dup"), Some(first));
        assert!(!tree.has_branch(root, "id", "other"));
    }

    #[test]
    fn test_set_value_replaces_in_place() {
        let mut tree = DataTree::new();
        let b = tree.grow_branch(tree.root()).unwrap();
        tree.set_int(b, "a", 1.0).unwrap();
        tree.set_int(b, "b", 2.0).unwrap();
        tree.set_int(b, "a", 3.0).unwrap();
        let view = tree.branch(b).unwrap();
        assert_eq!(view.fields().len(), 2);
        assert_eq!(view.fields()[0].value, Scalar::Int(3.0));
    }

    #[test]
    fn test_serializes_nested_document() {
        let mut tree = DataTree::new();
        let root = tree.root();
        tree.add_key(root, "sheetName").unwrap();
        let sheet = tree.grow_branch(root).unwrap();
        tree.set_hash(sheet, "sheetName", "Nums").unwrap();
        let mut header = BranchHeader::default();
        header.add("n", ScalarType::Int);
        tree.set_header(sheet, header).unwrap();
        let row = tree.grow_branch(sheet).unwrap();
        tree.push_element(row, Scalar::Int(1.0)).unwrap();
        tree.branch_ready(row).unwrap();
        tree.branch_ready(sheet).unwrap();

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["keys"][0], "sheetName");
        let sheet = &json["children"][0];
        assert_eq!(sheet["fields"]["sheetName"], "Nums");
        assert_eq!(sheet["header"][0]["type"], "Int");
        assert_eq!(sheet["children"][0]["elements"][0], 1);
        assert!(sheet.get("elements").is_none());
    }
}
