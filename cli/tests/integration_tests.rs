use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path =
            std::env::temp_dir().join(format!("sheet_tree_cli_test_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn sheet_tree(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sheet-tree"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run sheet-tree")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Writes per-sheet grids; `u9` in Orders has no matching user.
fn write_shop(dir: &TempDir) -> PathBuf {
    let grids = dir.join("shop");
    fs::create_dir_all(&grids).expect("failed to create grid dir");
    let orders = serde_json::json!([
        ["Key", "Ref(Users,id)", "[\"Int\"]"],
        ["id", "user", "qty"],
        ["o1", "u1", "[1,2]"],
        ["o2", "u9", "[]"]
    ]);
    let users = serde_json::json!([
        ["Key", "String"],
        ["id", "name"],
        ["u1", "Ann"],
        ["u2", "Bob"]
    ]);
    fs::write(grids.join("Orders.json"), orders.to_string()).expect("failed to write grid");
    fs::write(grids.join("Users.json"), users.to_string()).expect("failed to write grid");
    grids
}

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

// ---------------------------------------------------------------------------
// build / check
// ---------------------------------------------------------------------------

#[test]
fn build_writes_artifact_manifest_and_report() {
    let dir = TempDir::new("build");
    let input = write_shop(&dir);
    let artifact = dir.join("out/shop.json");
    let report = dir.join("out/report.json");

    let output = sheet_tree(&[
        "build",
        "--input",
        path_str(&input),
        "--output",
        path_str(&artifact),
        "--report",
        path_str(&report),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Built 2 sheet(s)"));

    let tree: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(tree["keys"], serde_json::json!(["sheetName"]));
    assert_eq!(tree["children"][0]["fields"]["sheetName"], "Orders");

    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.join("out/shop.json.manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["artifact"], "shop.json");
    assert_eq!(manifest["sheets"], serde_json::json!(["Orders", "Users"]));
    assert_eq!(manifest["diagnostic_counts"]["reference"], 1);

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(report["counts"]["reference"], 1);
    assert_eq!(report["diagnostics"][0]["row"], 4);
    assert_eq!(report["diagnostics"][0]["column"], "user");
}

#[test]
fn build_logs_diagnostics_as_warnings() {
    let dir = TempDir::new("build_logs");
    let input = write_shop(&dir);
    let artifact = dir.join("shop.json");

    let output = sheet_tree(&[
        "build",
        "--input",
        path_str(&input),
        "--output",
        path_str(&artifact),
    ]);
    assert!(output.status.success());
    let log = stderr(&output);
    assert!(log.contains("WARN"), "stderr: {log}");
    assert!(log.contains("missing ref"), "stderr: {log}");
}

#[test]
fn build_strict_exits_with_status_two() {
    let dir = TempDir::new("build_strict");
    let input = write_shop(&dir);
    let artifact = dir.join("shop.json");

    let output = sheet_tree(&[
        "build",
        "--input",
        path_str(&input),
        "--output",
        path_str(&artifact),
        "--strict",
    ]);
    assert_eq!(output.status.code(), Some(2));
    // The artifact is still written.
    assert!(artifact.exists());
}

#[test]
fn build_config_excludes_sheet_and_compresses() {
    let dir = TempDir::new("build_config");
    let input = write_shop(&dir);
    let config = dir.join("sheet-tree.yml");
    fs::write(&config, "exclude: [Orders]\noutput:\n  format: compressed\n  manifest: false\n")
        .unwrap();
    let artifact = dir.join("shop.json.gz");

    let output = sheet_tree(&[
        "build",
        "--input",
        path_str(&input),
        "--output",
        path_str(&artifact),
        "--config",
        path_str(&config),
        "--strict",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Built 1 sheet(s)"));
    let bytes = fs::read(&artifact).unwrap();
    assert_eq!(&bytes[..2], &[0x1f_u8, 0x8b]);
    assert!(!dir.join("shop.json.gz.manifest.json").exists());
}

#[test]
fn build_fails_on_missing_input() {
    let dir = TempDir::new("build_missing");
    let output = sheet_tree(&[
        "build",
        "--input",
        path_str(&dir.join("nope.json")),
        "--output",
        path_str(&dir.join("out.json")),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error: Failed to load"));
}

#[test]
fn check_prints_located_diagnostics() {
    let dir = TempDir::new("check");
    let input = write_shop(&dir);

    let output = sheet_tree(&["check", "--input", path_str(&input)]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("[reference] sheet 'Orders', row 4, column 'user'"), "{out}");
    assert!(out.contains("1 diagnostic(s): 0 schema, 0 coercion, 0 structural, 1 reference"));
    assert!(!dir.join("shop.json").exists());

    let strict = sheet_tree(&["check", "--input", path_str(&input), "--strict"]);
    assert_eq!(strict.status.code(), Some(2));
}

// ---------------------------------------------------------------------------
// schema / inspect
// ---------------------------------------------------------------------------

#[test]
fn schema_prints_selected_sheet() {
    let dir = TempDir::new("schema");
    let input = write_shop(&dir);

    let output = sheet_tree(&["schema", "--input", path_str(&input), "--sheet", "Users"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let sheets = parsed.as_array().unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0]["sheet"], "Users");

    let missing = sheet_tree(&["schema", "--input", path_str(&input), "--sheet", "Nope"]);
    assert_eq!(missing.status.code(), Some(1));
}

#[test]
fn schema_prints_list_columns_as_yaml() {
    let dir = TempDir::new("schema_yaml");
    let input = write_shop(&dir);
    let lines = serde_json::json!([
        ["Key", "[{\"s\":\"Key\"}]"],
        ["id", "parts"],
        ["l1", "[{\"s\":\"p1\"}]"]
    ]);
    fs::write(input.join("Lines.json"), lines.to_string()).expect("failed to write grid");

    let yaml = sheet_tree(&["schema", "--input", path_str(&input), "--format", "yaml"]);
    assert!(yaml.status.success(), "stderr: {}", stderr(&yaml));
    let out = stdout(&yaml);
    assert!(out.contains("sheet: Orders"), "{out}");
    assert!(out.contains("item: scalar"), "{out}");
    assert!(out.contains("item: record"), "{out}");
}

#[test]
fn inspect_verifies_manifest_and_summarizes() {
    let dir = TempDir::new("inspect");
    let input = write_shop(&dir);
    let artifact = dir.join("shop.json.gz");

    let built = sheet_tree(&[
        "build",
        "--input",
        path_str(&input),
        "--output",
        path_str(&artifact),
        "--format",
        "compressed",
    ]);
    assert!(built.status.success());

    let output = sheet_tree(&["inspect", "--artifact", path_str(&artifact)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Checksum verified"));
    assert!(out.contains("Orders: 2 row(s)"));
    assert!(out.contains("Users: 2 row(s)"));

    let mut bytes = fs::read(&artifact).unwrap();
    bytes.push(0);
    fs::write(&artifact, bytes).unwrap();
    let tampered = sheet_tree(&["inspect", "--artifact", path_str(&artifact)]);
    assert_eq!(tampered.status.code(), Some(1));
    assert!(stderr(&tampered).contains("Manifest check failed"));
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

#[test]
fn build_saves_tree_to_database() {
    let dir = TempDir::new("build_db");
    let input = write_shop(&dir);
    let db = dir.join("trees.db");

    let output = sheet_tree(&[
        "build",
        "--input",
        path_str(&input),
        "--output",
        path_str(&dir.join("shop.json")),
        "--db",
        path_str(&db),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Saved tree 'shop'"));

    let conn = rusqlite::Connection::open(&db).unwrap();
    let name: String = conn
        .query_row("SELECT name FROM st_trees", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "shop");
}

#[test]
fn migrate_lifecycle() {
    let dir = TempDir::new("migrate");
    let input = write_shop(&dir);
    let db = dir.join("trees.db");
    let db_arg = path_str(&db);

    let up = sheet_tree(&["migrate", "up", "--db", db_arg, "--prefix", "t_"]);
    assert!(up.status.success(), "stderr: {}", stderr(&up));

    let seed = sheet_tree(&[
        "migrate", "seed", "--db", db_arg, "--prefix", "t_", "--name", "shop", "--source",
        path_str(&input),
    ]);
    assert!(seed.status.success(), "stderr: {}", stderr(&seed));
    assert!(stdout(&seed).contains("Sheets: 2"));

    let status = sheet_tree(&["migrate", "status", "--db", db_arg, "--prefix", "t_"]);
    let out = stdout(&status);
    assert!(out.contains("Tables exist: yes"));
    assert!(out.contains("Tree count: 1"));

    let refresh = sheet_tree(&[
        "migrate", "refresh", "--db", db_arg, "--prefix", "t_", "--name", "again", "--source",
        path_str(&input),
    ]);
    assert!(refresh.status.success(), "stderr: {}", stderr(&refresh));
    let status = sheet_tree(&["migrate", "status", "--db", db_arg, "--prefix", "t_"]);
    assert!(stdout(&status).contains("Tree count: 1"));

    let down = sheet_tree(&["migrate", "down", "--db", db_arg, "--prefix", "t_"]);
    assert!(down.status.success());
    let status = sheet_tree(&["migrate", "status", "--db", db_arg, "--prefix", "t_"]);
    assert!(stdout(&status).contains("Tables exist: no"));
    assert!(dir.path().join("trees.db").exists());
}

#[test]
fn migrate_rejects_invalid_prefix() {
    let dir = TempDir::new("migrate_prefix");
    let db = dir.join("trees.db");
    let output = sheet_tree(&["migrate", "up", "--db", path_str(&db), "--prefix", "bad-prefix"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("invalid prefix"));
}
