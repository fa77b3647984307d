mod logging;

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use sheet_tree_core::builder::sheet_schema;
use sheet_tree_core::{
    DataTree, Diagnostic, DiagnosticCounts, GrowReport, SHEET_NAME_KEY, SheetSchema, SheetSummary,
    Workbook, grow_tree,
};
use sheet_tree_db::{
    ArtifactFormat, ArtifactManifest, BuildConfig, WorkbookLoader, read_artifact, write_artifact,
};
use sheet_tree_sqlite::{Migration, TreeQuery};
use tracing::info;

use crate::logging::{LogConfig, emit_diagnostics, init_logging};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PREFIX: &str = "st_";
const EXIT_STRICT_REFERENCES: i32 = 2;

/// Artifact encoding selectable on the command line.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliArtifactFormat {
    Json,
    Compressed,
}

impl From<CliArtifactFormat> for ArtifactFormat {
    fn from(fmt: CliArtifactFormat) -> Self {
        match fmt {
            CliArtifactFormat::Json => Self::Json,
            CliArtifactFormat::Compressed => Self::Compressed,
        }
    }
}

/// Document format for printed schemas.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "sheet-tree")]
#[command(about = "Grow typed data trees from spreadsheet exports", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a tree artifact from a workbook export.
    Build(BuildArgs),
    /// Build in memory and report diagnostics without writing anything.
    Check(CheckArgs),
    /// Print the parsed column schema of each sheet.
    Schema(SchemaArgs),
    /// Read a written artifact back and summarize it.
    Inspect(InspectArgs),
    /// SQLite table migration and seeding operations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Spreadsheet JSON document or directory of per-sheet JSON grids.
    #[arg(long)]
    input: PathBuf,
    /// YAML build configuration (sheet selection, output, strictness).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Artifact output path.
    #[arg(long)]
    output: PathBuf,
    /// Artifact encoding (overrides the config file).
    #[arg(long)]
    format: Option<CliArtifactFormat>,
    /// Exit with status 2 when any reference diagnostic is found.
    #[arg(long)]
    strict: bool,
    /// Write the diagnostic report as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Also save the tree into this SQLite database.
    #[arg(long)]
    db: Option<PathBuf>,
    /// Table prefix for --db.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
    /// Tree name for --db (defaults to the input file stem).
    #[arg(long)]
    name: Option<String>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Exit with status 2 when any reference diagnostic is found.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// Spreadsheet JSON document or directory of per-sheet JSON grids.
    #[arg(long)]
    input: PathBuf,
    /// Only print this sheet.
    #[arg(long)]
    sheet: Option<String>,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Artifact path.
    #[arg(long)]
    artifact: PathBuf,
    /// Artifact encoding (inferred from the extension when omitted).
    #[arg(long)]
    format: Option<CliArtifactFormat>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create tree tables in the database.
    Up(DbArgs),
    /// Drop tree tables from the database.
    Down(DbArgs),
    /// Show migration and table status.
    Status(DbArgs),
    /// Grow a workbook and store it as a named tree.
    Seed(MigrateSeedArgs),
    /// Drop tables, recreate, and seed one tree.
    Refresh(MigrateSeedArgs),
}

#[derive(Debug, Args)]
struct DbArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table prefix.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
}

#[derive(Debug, Args)]
struct MigrateSeedArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Tree name.
    #[arg(long)]
    name: String,
    /// Spreadsheet JSON document or directory of per-sheet JSON grids.
    #[arg(long)]
    source: PathBuf,
}

/// How a successful command wants the process to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Clean,
    ReferenceFailures,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_ansi(std::io::stderr().is_terminal());
    if let Err(err) = init_logging(&log_config) {
        eprintln!("warning: {err}");
    }

    let result = match cli.command {
        Command::Build(args) => run_build(args),
        Command::Check(args) => run_check(args),
        Command::Schema(args) => run_schema(args).map(|()| Status::Clean),
        Command::Inspect(args) => run_inspect(args).map(|()| Status::Clean),
        Command::Migrate(args) => run_migrate(args).map(|()| Status::Clean),
    };

    match result {
        Ok(Status::Clean) => {}
        Ok(Status::ReferenceFailures) => std::process::exit(EXIT_STRICT_REFERENCES),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// build / check
// ---------------------------------------------------------------------------

/// JSON document written by `build --report`.
#[derive(Debug, Serialize)]
struct DiagnosticReport<'a> {
    tool_version: &'a str,
    counts: DiagnosticCounts,
    sheets: &'a [SheetSummary],
    diagnostics: &'a [Diagnostic],
}

fn run_build(args: BuildArgs) -> Result<Status, String> {
    let config = load_config(args.source.config.as_deref())?;
    let (tree, report) = grow_from(&args.source.input, &config)?;

    let format: ArtifactFormat = args
        .format
        .map(Into::into)
        .unwrap_or(config.output.format);
    let checksum = write_artifact(&tree, &args.output, format)
        .map_err(|e| format!("Failed to write '{}': {e}", args.output.display()))?;

    if config.output.manifest {
        let manifest_path = ArtifactManifest::path_for(&args.output);
        ArtifactManifest::new(PACKAGE_VERSION, file_name(&args.output), format, checksum)
            .with_report(&report)
            .save(&manifest_path)
            .map_err(|e| format!("Failed to write '{}': {e}", manifest_path.display()))?;
    }

    if let Some(ref path) = args.report {
        let document = DiagnosticReport {
            tool_version: PACKAGE_VERSION,
            counts: report.counts(),
            sheets: &report.sheets,
            diagnostics: &report.diagnostics,
        };
        write_pretty_json(path, &document)?;
    }

    if let Some(ref db) = args.db {
        let name = match args.name {
            Some(name) => name,
            None => input_stem(&args.source.input)?,
        };
        save_to_db(db, &args.prefix, &name, &tree)?;
        println!("Saved tree '{name}' to '{}'.", db.display());
    }

    println!(
        "Built {} sheet(s) into '{}' ({} diagnostic(s)).",
        report.sheets.len(),
        args.output.display(),
        report.diagnostics.len()
    );

    Ok(strict_status(&report, args.strict || config.references.strict))
}

fn run_check(args: CheckArgs) -> Result<Status, String> {
    let config = load_config(args.source.config.as_deref())?;
    let (_, report) = grow_from(&args.source.input, &config)?;

    for diagnostic in &report.diagnostics {
        println!("{diagnostic}");
    }
    for sheet in &report.sheets {
        println!(
            "  {}: {} column(s), {} row(s)",
            sheet.name, sheet.columns, sheet.rows
        );
    }
    let counts = report.counts();
    println!(
        "{} diagnostic(s): {} schema, {} coercion, {} structural, {} reference",
        counts.total(),
        counts.schema,
        counts.coercion,
        counts.structural,
        counts.reference
    );

    Ok(strict_status(&report, args.strict || config.references.strict))
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig, String> {
    match path {
        Some(path) => BuildConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display())),
        None => Ok(BuildConfig::default()),
    }
}

fn load_workbook(input: &Path) -> Result<Workbook, String> {
    WorkbookLoader::load(input).map_err(|e| format!("Failed to load '{}': {e}", input.display()))
}

/// Loads, grows, and validates; every diagnostic is logged before returning.
fn grow_from(input: &Path, config: &BuildConfig) -> Result<(DataTree, GrowReport), String> {
    let workbook = load_workbook(input)?;
    let mut tree = DataTree::new();
    let report = grow_tree(&workbook, &mut tree, &config.grow_options())
        .map_err(|e| format!("Tree build failed: {e}"))?;
    emit_diagnostics(&report.diagnostics);
    info!(
        sheets = report.sheets.len(),
        diagnostics = report.diagnostics.len(),
        "Grew tree from '{}'",
        input.display()
    );
    Ok((tree, report))
}

fn strict_status(report: &GrowReport, strict: bool) -> Status {
    if strict && report.has_reference_issues() {
        Status::ReferenceFailures
    } else {
        Status::Clean
    }
}

fn save_to_db(db: &Path, prefix: &str, name: &str, tree: &DataTree) -> Result<(), String> {
    let mut migration = open_migration(db, prefix)?;
    migration
        .up()
        .map_err(|e| format!("Migration up failed: {e}"))?;
    let conn = migration.into_connection();
    let query = TreeQuery::new(&conn, prefix)
        .map_err(|e| format!("Failed to open tree tables: {e}"))?;
    query
        .save_tree(name, tree)
        .map_err(|e| format!("Failed to save tree '{name}': {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// schema
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SheetSchemaOutput<'a> {
    sheet: &'a str,
    schema: SheetSchema,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<String>,
}

fn run_schema(args: SchemaArgs) -> Result<(), String> {
    let workbook = load_workbook(&args.input)?;

    let mut outputs = Vec::new();
    for sheet in &workbook.sheets {
        if args.sheet.as_deref().is_some_and(|name| name != sheet.name) {
            continue;
        }
        let (schema, diagnostics) = sheet_schema(sheet);
        outputs.push(SheetSchemaOutput {
            sheet: &sheet.name,
            schema,
            issues: diagnostics.iter().map(ToString::to_string).collect(),
        });
    }

    if let (Some(name), true) = (&args.sheet, outputs.is_empty()) {
        return Err(format!("Sheet '{name}' not found in '{}'", args.input.display()));
    }

    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&outputs)
            .map_err(|e| format!("JSON serialization failed: {e}"))?,
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(&outputs).map_err(|e| format!("YAML serialization failed: {e}"))?
        }
    };
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

fn run_inspect(args: InspectArgs) -> Result<(), String> {
    let format = args
        .format
        .map(Into::into)
        .unwrap_or_else(|| ArtifactFormat::from_path(&args.artifact));

    let manifest_path = ArtifactManifest::path_for(&args.artifact);
    if manifest_path.exists() {
        let manifest = ArtifactManifest::load(&manifest_path)
            .map_err(|e| format!("Failed to load '{}': {e}", manifest_path.display()))?;
        manifest
            .verify(&args.artifact)
            .map_err(|e| format!("Manifest check failed: {e}"))?;
        println!(
            "Checksum verified (written by {} at {}).",
            manifest.tool_version, manifest.generated_at
        );
    }

    let document = read_artifact(&args.artifact, format)
        .map_err(|e| format!("Failed to read '{}': {e}", args.artifact.display()))?;
    let sheets = sheet_rows(&document)
        .ok_or_else(|| format!("'{}' is not a tree artifact", args.artifact.display()))?;

    println!("{} ({} sheet(s)):", args.artifact.display(), sheets.len());
    for (name, rows) in sheets {
        println!("  {name}: {rows} row(s)");
    }
    Ok(())
}

/// Sheet names and row counts from a serialized tree document.
fn sheet_rows(document: &Value) -> Option<Vec<(String, usize)>> {
    document
        .get("children")?
        .as_array()?
        .iter()
        .map(|sheet| {
            let name = sheet.get("fields")?.get(SHEET_NAME_KEY)?.as_str()?;
            let rows = sheet.get("children")?.as_array()?.len();
            Some((name.to_string(), rows))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// migrate
// ---------------------------------------------------------------------------

fn run_migrate(args: MigrateArgs) -> Result<(), String> {
    match args.operation {
        MigrateOperation::Up(args) => run_migrate_up(args),
        MigrateOperation::Down(args) => run_migrate_down(args),
        MigrateOperation::Status(args) => run_migrate_status(args),
        MigrateOperation::Seed(args) => run_migrate_seed(args, false),
        MigrateOperation::Refresh(args) => run_migrate_seed(args, true),
    }
}

fn open_migration(db: &Path, prefix: &str) -> Result<Migration, String> {
    let conn = rusqlite::Connection::open(db)
        .map_err(|e| format!("Failed to open database '{}': {e}", db.display()))?;
    Migration::new(conn, prefix).map_err(|e| format!("Failed to initialize migration: {e}"))
}

fn run_migrate_up(args: DbArgs) -> Result<(), String> {
    let mut migration = open_migration(&args.db, &args.prefix)?;
    migration
        .up()
        .map_err(|e| format!("Migration up failed: {e}"))?;
    println!(
        "Migration up complete. Tables created with prefix '{}' in '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_migrate_down(args: DbArgs) -> Result<(), String> {
    let mut migration = open_migration(&args.db, &args.prefix)?;
    migration
        .down()
        .map_err(|e| format!("Migration down failed: {e}"))?;
    println!(
        "Migration down complete. Tables with prefix '{}' dropped from '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_migrate_status(args: DbArgs) -> Result<(), String> {
    let migration = open_migration(&args.db, &args.prefix)?;
    let status = migration
        .status()
        .map_err(|e| format!("Failed to get migration status: {e}"))?;
    println!("Migration Status:");
    println!(
        "  Tables exist: {}",
        if status.tables_exist { "yes" } else { "no" }
    );
    println!("  Tree count: {}", status.tree_count);
    println!("  Branch count: {}", status.branch_count);
    println!("  Field count: {}", status.field_count);
    Ok(())
}

fn run_migrate_seed(args: MigrateSeedArgs, refresh: bool) -> Result<(), String> {
    let mut migration = open_migration(&args.db.db, &args.db.prefix)?;
    let report = if refresh {
        migration
            .refresh(&args.name, &args.source)
            .map_err(|e| format!("Refresh failed: {e}"))?
    } else {
        migration.up().map_err(|e| format!("Migration up failed: {e}"))?;
        migration
            .seed(&args.name, &args.source)
            .map_err(|e| format!("Seed failed: {e}"))?
    };
    if refresh {
        println!("Refresh complete (tables dropped, recreated, and reseeded):");
    } else {
        println!("Seed complete:");
    }
    println!("  Sheets: {}", report.sheets);
    println!("  Branches inserted: {}", report.branches_inserted);
    println!("  Fields inserted: {}", report.fields_inserted);
    println!("  Elements inserted: {}", report.elements_inserted);
    println!("  Diagnostics: {}", report.diagnostics);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    let raw = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to serialize '{}': {err}", path.display()))?;
    fs::write(path, raw).map_err(|err| format!("Failed to write '{}': {err}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Default tree name: the input file or directory name without extension.
fn input_stem(input: &Path) -> Result<String, String> {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            format!(
                "Cannot derive a tree name from '{}'; pass --name",
                input.display()
            )
        })
}
