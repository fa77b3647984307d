//! End-to-end workbook builds through the public API.

use serde_json::{Value, json};
use sheet_tree_core::*;

fn sheet(name: &str, rows: &[Value]) -> Sheet {
    Sheet::from_json_rows(name, rows)
}

fn shop() -> Workbook {
    Workbook::new(vec![
        sheet(
            "Users",
            &[
                json!(["Key", "String", "Bool"]),
                json!(["id", "name", "active"]),
                json!(["u41", "Ann", true]),
                json!(["u43", "Bob", "false"]),
            ],
        ),
        sheet(
            "Orders",
            &[
                json!(["Key", "Ref(Users,id)", r#"[{"sku":"Key","qty":"Int"}]"#, "Float"]),
                json!(["id", "user", "items", "total"]),
                json!(["o1", "u41", r#"[{"sku":"a","qty":2}]"#, 9.5]),
                json!(["o2", "u42", "[]", "12"]),
                json!(["o3", null, r#"[{"sku":"b","qty":1.5}]"#, null]),
            ],
        ),
    ])
}

#[test]
fn test_orders_and_users_build_with_located_findings() {
    let mut tree = DataTree::new();
    let report = grow_tree(&shop(), &mut tree, &GrowOptions::default()).unwrap();

    assert!(tree.is_complete());
    assert_eq!(report.sheets.len(), 2);

    let kinds: Vec<_> = report
        .diagnostics
        .iter()
        .map(|d| (d.kind(), d.row, d.column.clone()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (DiagnosticKind::Coercion, Some(5), Some("user".to_string())),
            (DiagnosticKind::Coercion, Some(5), Some("items[0].qty".to_string())),
            (DiagnosticKind::Reference, Some(4), Some("user".to_string())),
        ]
    );
    assert_eq!(
        report.diagnostics[2].to_string(),
        "[reference] sheet 'Orders', row 4, column 'user': missing ref: sheet Users, key id, value u42"
    );

    let root = tree.root_view();
    let users = root.child_where(SHEET_NAME_KEY, "Users").unwrap();
    let bob = users.child_where("id", "u43").unwrap();
    assert_eq!(bob.field("active"), Some(&Scalar::Bool(false)));

    let orders = root.child_where(SHEET_NAME_KEY, "Orders").unwrap();
    let o2 = orders.child_where("id", "o2").unwrap();
    assert_eq!(o2.field("total"), Some(&Scalar::Float(12.0)));
    let o3 = orders.child_where("id", "o3").unwrap();
    assert_eq!(o3.field("user"), Some(&Scalar::Hash(String::new())));
    assert_eq!(o3.field("total"), Some(&Scalar::Float(0.0)));
}

#[test]
fn test_build_is_deterministic() {
    let mut first = DataTree::new();
    let mut second = DataTree::new();
    let a = grow_tree(&shop(), &mut first, &GrowOptions::default()).unwrap();
    let b = grow_tree(&shop(), &mut second, &GrowOptions::default()).unwrap();

    assert_eq!(first, second);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_serialized_tree_shape() {
    let mut tree = DataTree::new();
    grow_tree(&shop(), &mut tree, &GrowOptions::default()).unwrap();
    let json = serde_json::to_value(&tree).unwrap();

    let orders = &json["children"][1];
    assert_eq!(orders["fields"]["sheetName"], "Orders");
    assert_eq!(orders["keys"], json!(["id"]));

    let o1 = &orders["children"][0];
    assert_eq!(o1["keys"], json!([BRANCH_NAME_KEY]));
    assert_eq!(o1["fields"]["total"], 9.5);

    let items = &o1["children"][0];
    assert_eq!(items["fields"][BRANCH_NAME_KEY], "items");
    assert_eq!(items["children"][0]["fields"]["qty"], 2);
}

#[test]
fn test_sheet_with_only_headers_has_no_rows() {
    let workbook = Workbook::new(vec![sheet("Empty", &[json!(["Int"]), json!(["n"])])]);
    let mut tree = DataTree::new();
    let report = grow_tree(&workbook, &mut tree, &GrowOptions::default()).unwrap();
    assert_eq!(report.sheets[0].rows, 0);
    assert!(report.diagnostics.is_empty());
    let empty = tree.root_view().child_where(SHEET_NAME_KEY, "Empty").unwrap();
    assert_eq!(empty.children().count(), 0);
    assert!(empty.is_ready());
}

#[test]
fn test_include_list_limits_built_sheets() {
    let options = GrowOptions {
        include: vec!["Users".into()],
        ..GrowOptions::default()
    };
    let mut tree = DataTree::new();
    let report = grow_tree(&shop(), &mut tree, &options).unwrap();
    assert_eq!(report.sheets.len(), 1);
    assert!(report.references.is_empty());
    assert!(report.diagnostics.is_empty());
}
