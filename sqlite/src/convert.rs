//! Conversion between [`DataTree`] branches and SQLite rows.
//!
//! Saving walks the tree depth-first and writes one `branches` row per
//! branch, with its keys, header columns, fields, and list elements in
//! their own tables. Loading reads every row of one tree in a handful of
//! queries and replays them through the [`TreeSink`] operations, readying
//! each branch after its children.
//!
//! Scalars are stored as `kind` plus either `text_value` (`Hash`,
//! `String`) or `number_value` (`Int`, `Float`, and `Bool` as 0/1).

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use sheet_tree_core::{
    BranchHeader, BranchId, BranchView, DataTree, Field, HeaderColumn, Scalar, ScalarType,
    TreeSink,
};

use crate::error::{Result, SqliteError};

/// Row counts written by [`insert_tree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertCounts {
    pub branches: usize,
    pub keys: usize,
    pub header_columns: usize,
    pub fields: usize,
    pub elements: usize,
}

/// Parses a stored scalar type name.
pub(crate) fn parse_scalar_type(s: &str) -> Result<ScalarType> {
    match s {
        "Hash" => Ok(ScalarType::Hash),
        "Int" => Ok(ScalarType::Int),
        "Float" => Ok(ScalarType::Float),
        "Bool" => Ok(ScalarType::Bool),
        "String" => Ok(ScalarType::String),
        other => Err(SqliteError::ConversionError(format!(
            "unknown scalar type: {other}"
        ))),
    }
}

/// Splits a scalar into its `(text_value, number_value)` columns.
pub(crate) fn scalar_columns(value: &Scalar) -> (Option<&str>, Option<f64>) {
    match value {
        Scalar::Hash(s) | Scalar::String(s) => (Some(s.as_str()), None),
        Scalar::Int(n) | Scalar::Float(n) => (None, Some(*n)),
        Scalar::Bool(b) => (None, Some(if *b { 1.0 } else { 0.0 })),
    }
}

/// Rebuilds a scalar from its stored columns.
pub(crate) fn scalar_from_columns(
    kind: &str,
    text: Option<String>,
    number: Option<f64>,
) -> Result<Scalar> {
    let missing = || SqliteError::ConversionError(format!("{kind} value has no stored payload"));
    Ok(match parse_scalar_type(kind)? {
        ScalarType::Hash => Scalar::Hash(text.ok_or_else(missing)?),
        ScalarType::String => Scalar::String(text.ok_or_else(missing)?),
        ScalarType::Int => Scalar::Int(number.ok_or_else(missing)?),
        ScalarType::Float => Scalar::Float(number.ok_or_else(missing)?),
        ScalarType::Bool => Scalar::Bool(number.ok_or_else(missing)? != 0.0),
    })
}

/// Inserts `tree` under `name` and returns the tree row ID with the counts
/// of rows written.
///
/// The caller owns the transaction and any replacement of an existing tree
/// of the same name.
pub fn insert_tree(
    conn: &Connection,
    prefix: &str,
    name: &str,
    tree: &DataTree,
) -> Result<(i64, InsertCounts)> {
    conn.execute(
        &format!("INSERT INTO {prefix}trees (name) VALUES (?1)"),
        params![name],
    )?;
    let tree_id = conn.last_insert_rowid();

    let mut counts = InsertCounts::default();
    insert_branch(conn, prefix, tree_id, None, 0, tree.root_view(), &mut counts)?;
    Ok((tree_id, counts))
}

fn insert_branch(
    conn: &Connection,
    prefix: &str,
    tree_id: i64,
    parent_id: Option<i64>,
    ordinal: usize,
    view: BranchView<'_>,
    counts: &mut InsertCounts,
) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}branches (tree_id, parent_id, ordinal, ready, has_header) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            tree_id,
            parent_id,
            ordinal as i64,
            view.is_ready() as i32,
            view.header().is_some() as i32,
        ],
    )?;
    let branch_id = conn.last_insert_rowid();
    counts.branches += 1;

    for (i, key) in view.keys().iter().enumerate() {
        conn.execute(
            &format!("INSERT INTO {prefix}branch_keys (branch_id, ordinal, name) VALUES (?1, ?2, ?3)"),
            params![branch_id, i as i64, key],
        )?;
        counts.keys += 1;
    }

    if let Some(header) = view.header() {
        for (i, column) in header.columns.iter().enumerate() {
            conn.execute(
                &format!(
                    "INSERT INTO {prefix}header_columns (branch_id, ordinal, name, scalar_type) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![branch_id, i as i64, column.name, column.scalar_type.as_str()],
            )?;
            counts.header_columns += 1;
        }
    }

    for (i, field) in view.fields().iter().enumerate() {
        insert_value(conn, prefix, branch_id, i, Some(&field.name), &field.value)?;
        counts.fields += 1;
    }
    for (i, element) in view.elements().iter().enumerate() {
        insert_value(conn, prefix, branch_id, i, None, element)?;
        counts.elements += 1;
    }

    for (i, child) in view.children().enumerate() {
        insert_branch(conn, prefix, tree_id, Some(branch_id), i, child, counts)?;
    }

    Ok(branch_id)
}

fn insert_value(
    conn: &Connection,
    prefix: &str,
    branch_id: i64,
    ordinal: usize,
    name: Option<&str>,
    value: &Scalar,
) -> Result<()> {
    let (text, number) = scalar_columns(value);
    conn.execute(
        &format!(
            "INSERT INTO {prefix}fields (branch_id, ordinal, name, kind, text_value, number_value) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            branch_id,
            ordinal as i64,
            name,
            value.scalar_type().as_str(),
            text,
            number,
        ],
    )?;
    Ok(())
}

/// Looks up the row ID of a saved tree.
pub fn tree_id(conn: &Connection, prefix: &str, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            &format!("SELECT id FROM {prefix}trees WHERE name = ?1"),
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Looks up the root branch of a saved tree.
pub fn root_branch_id(conn: &Connection, prefix: &str, tree_id: i64) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            &format!(
                "SELECT id FROM {prefix}branches WHERE tree_id = ?1 AND parent_id IS NULL \
                 ORDER BY id LIMIT 1"
            ),
            params![tree_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// First child of `parent_id` whose text field `key` equals `value`.
///
/// Matches only when `key` is registered on the parent; children are
/// scanned in creation order.
pub fn find_child(
    conn: &Connection,
    prefix: &str,
    parent_id: i64,
    key: &str,
    value: &str,
) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            &format!(
                "SELECT c.id FROM {prefix}branches c \
                 JOIN {prefix}fields f ON f.branch_id = c.id \
                 WHERE c.parent_id = ?1 \
                   AND f.name = ?2 \
                   AND f.kind IN ('Hash', 'String') \
                   AND f.text_value = ?3 \
                   AND EXISTS (SELECT 1 FROM {prefix}branch_keys k WHERE k.branch_id = ?1 AND k.name = ?2) \
                 ORDER BY c.ordinal LIMIT 1"
            ),
            params![parent_id, key, value],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Named fields of one stored branch, in insertion order.
pub fn load_fields(conn: &Connection, prefix: &str, branch_id: i64) -> Result<Vec<Field>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name, kind, text_value, number_value FROM {prefix}fields \
         WHERE branch_id = ?1 AND name IS NOT NULL ORDER BY ordinal"
    ))?;
    let mut rows = stmt.query(params![branch_id])?;

    let mut fields = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let kind: String = row.get(1)?;
        let value = scalar_from_columns(&kind, row.get(2)?, row.get(3)?)?;
        fields.push(Field { name, value });
    }
    Ok(fields)
}

#[derive(Debug, Default)]
struct StoredBranch {
    ready: bool,
    has_header: bool,
    keys: Vec<String>,
    header: Vec<HeaderColumn>,
    fields: Vec<(String, Scalar)>,
    elements: Vec<Scalar>,
    children: Vec<i64>,
}

/// Loads a saved tree by name, or `None` if no such tree exists.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] for rows that do not describe a
/// tree, or [`SqliteError::SinkError`] if the stored ready flags are not
/// post-ordered.
pub fn load_tree(conn: &Connection, prefix: &str, name: &str) -> Result<Option<DataTree>> {
    let Some(tree_id) = tree_id(conn, prefix, name)? else {
        return Ok(None);
    };

    let mut branches: HashMap<i64, StoredBranch> = HashMap::new();
    let mut root = None;
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, parent_id, ready, has_header FROM {prefix}branches \
             WHERE tree_id = ?1 ORDER BY ordinal, id"
        ))?;
        let mut rows = stmt.query(params![tree_id])?;
        let mut order = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let parent: Option<i64> = row.get(1)?;
            branches.insert(
                id,
                StoredBranch {
                    ready: row.get::<_, i64>(2)? != 0,
                    has_header: row.get::<_, i64>(3)? != 0,
                    ..StoredBranch::default()
                },
            );
            order.push((id, parent));
        }
        for (id, parent) in order {
            match parent {
                None => root = Some(id),
                Some(parent) => branches
                    .get_mut(&parent)
                    .ok_or_else(|| orphan(id, parent))?
                    .children
                    .push(id),
            }
        }
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT k.branch_id, k.name FROM {prefix}branch_keys k \
             JOIN {prefix}branches b ON b.id = k.branch_id \
             WHERE b.tree_id = ?1 ORDER BY k.branch_id, k.ordinal"
        ))?;
        let mut rows = stmt.query(params![tree_id])?;
        while let Some(row) = rows.next()? {
            let branch_id: i64 = row.get(0)?;
            stored(&mut branches, branch_id)?.keys.push(row.get(1)?);
        }
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT h.branch_id, h.name, h.scalar_type FROM {prefix}header_columns h \
             JOIN {prefix}branches b ON b.id = h.branch_id \
             WHERE b.tree_id = ?1 ORDER BY h.branch_id, h.ordinal"
        ))?;
        let mut rows = stmt.query(params![tree_id])?;
        while let Some(row) = rows.next()? {
            let branch_id: i64 = row.get(0)?;
            let scalar_type: String = row.get(2)?;
            stored(&mut branches, branch_id)?.header.push(HeaderColumn {
                name: row.get(1)?,
                scalar_type: parse_scalar_type(&scalar_type)?,
            });
        }
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT f.branch_id, f.name, f.kind, f.text_value, f.number_value FROM {prefix}fields f \
             JOIN {prefix}branches b ON b.id = f.branch_id \
             WHERE b.tree_id = ?1 ORDER BY f.branch_id, f.ordinal"
        ))?;
        let mut rows = stmt.query(params![tree_id])?;
        while let Some(row) = rows.next()? {
            let branch_id: i64 = row.get(0)?;
            let name: Option<String> = row.get(1)?;
            let kind: String = row.get(2)?;
            let value = scalar_from_columns(&kind, row.get(3)?, row.get(4)?)?;
            let branch = stored(&mut branches, branch_id)?;
            match name {
                Some(name) => branch.fields.push((name, value)),
                None => branch.elements.push(value),
            }
        }
    }

    let root = root.ok_or_else(|| {
        SqliteError::ConversionError(format!("tree '{name}' has no root branch"))
    })?;
    let mut tree = DataTree::new();
    let handle = tree.root();
    replay(&mut tree, &branches, root, handle)?;
    Ok(Some(tree))
}

fn stored(branches: &mut HashMap<i64, StoredBranch>, id: i64) -> Result<&mut StoredBranch> {
    branches
        .get_mut(&id)
        .ok_or_else(|| SqliteError::ConversionError(format!("row refers to unknown branch {id}")))
}

fn orphan(id: i64, parent: i64) -> SqliteError {
    SqliteError::ConversionError(format!("branch {id} refers to missing parent {parent}"))
}

/// Replays one stored branch and its subtree into `sink`, post-order.
fn replay<S: TreeSink>(
    sink: &mut S,
    branches: &HashMap<i64, StoredBranch>,
    id: i64,
    handle: BranchId,
) -> Result<()> {
    let branch = branches
        .get(&id)
        .ok_or_else(|| SqliteError::ConversionError(format!("unknown branch {id}")))?;

    for key in &branch.keys {
        sink.add_key(handle, key)?;
    }
    if branch.has_header {
        sink.set_header(
            handle,
            BranchHeader {
                columns: branch.header.clone(),
            },
        )?;
    }
    for (name, value) in &branch.fields {
        sink.set_value(handle, name, value.clone())?;
    }
    for element in &branch.elements {
        sink.push_element(handle, element.clone())?;
    }
    for &child in &branch.children {
        let child_handle = sink.grow_branch(handle)?;
        replay(sink, branches, child, child_handle)?;
    }
    if branch.ready {
        sink.branch_ready(handle)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate_schema_sql;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        conn
    }

    #[test]
    fn test_scalar_columns_roundtrip_each_kind() {
        for value in [
            Scalar::Hash("h".into()),
            Scalar::String(String::new()),
            Scalar::Int(-4.0),
            Scalar::Float(2.5),
            Scalar::Bool(true),
            Scalar::Bool(false),
        ] {
            let (text, number) = scalar_columns(&value);
            let kind = value.scalar_type().as_str();
            let back = scalar_from_columns(kind, text.map(String::from), number).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_missing_payload_is_conversion_error() {
        assert!(matches!(
            scalar_from_columns("Int", Some("3".into()), None),
            Err(SqliteError::ConversionError(_))
        ));
        assert!(parse_scalar_type("Date").is_err());
    }

    #[test]
    fn test_insert_and_load_preserves_structure() {
        let conn = setup();
        let mut tree = DataTree::new();
        let root = tree.root();
        tree.add_key(root, "sheetName").unwrap();
        let sheet = tree.grow_branch(root).unwrap();
        tree.set_hash(sheet, "sheetName", "Nums").unwrap();
        tree.set_header(sheet, BranchHeader::default()).unwrap();
        let list = tree.grow_branch(sheet).unwrap();
        tree.push_element(list, Scalar::Int(1.0)).unwrap();
        tree.push_element(list, Scalar::Int(2.0)).unwrap();
        tree.branch_ready(list).unwrap();
        tree.branch_ready(sheet).unwrap();

        let (_, counts) = insert_tree(&conn, "t_", "nums", &tree).unwrap();
        assert_eq!(counts.branches, 3);
        assert_eq!(counts.keys, 1);
        assert_eq!(counts.fields, 1);
        assert_eq!(counts.elements, 2);

        let loaded = load_tree(&conn, "t_", "nums").unwrap().unwrap();
        assert_eq!(loaded, tree);
        assert!(load_tree(&conn, "t_", "other").unwrap().is_none());
    }

    #[test]
    fn test_find_child_requires_registered_key() {
        let conn = setup();
        let mut tree = DataTree::new();
        let root = tree.root();
        let child = tree.grow_branch(root).unwrap();
        tree.set_hash(child, "id", "a").unwrap();
        tree.branch_ready(child).unwrap();

        let (tree_id, _) = insert_tree(&conn, "t_", "x", &tree).unwrap();
        let root_id = root_branch_id(&conn, "t_", tree_id).unwrap().unwrap();
        assert_eq!(find_child(&conn, "t_", root_id, "id", "a").unwrap(), None);

        conn.execute(
            "INSERT INTO t_branch_keys (branch_id, ordinal, name) VALUES (?1, 0, 'id')",
            [root_id],
        )
        .unwrap();
        let found = find_child(&conn, "t_", root_id, "id", "a").unwrap().unwrap();
        let fields = load_fields(&conn, "t_", found).unwrap();
        assert_eq!(fields[0].value, Scalar::Hash("a".into()));
    }
}
