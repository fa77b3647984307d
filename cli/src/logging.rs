//! Logging setup for the `sheet-tree` binary.
//!
//! Library crates emit `tracing` events; this module installs the one
//! subscriber that prints them. Output goes to stderr so stdout stays
//! reserved for command results.
//!
//! # Levels
//!
//! - `warn`: located diagnostics (default)
//! - `info`: build summaries (`-v`)
//! - `debug`: per-sheet and per-artifact progress (`-vv`)
//! - `trace`: everything (`-vvv`)
//!
//! `RUST_LOG` overrides the verbosity flags when set.

use tracing::{Level, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sheet_tree_core::Diagnostic;

/// Crates whose events follow the verbosity level; everything else stays at
/// `warn`.
const CRATES: &[&str] = &[
    "sheet_tree",
    "sheet_tree_core",
    "sheet_tree_db",
    "sheet_tree_sqlite",
];

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Maps the `-v` count to a level: none is warn, then info, debug, trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            with_target: verbosity >= 2,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Installs the global subscriber writing compact lines to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let layer = fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target);

    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(layer)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {e}"))
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

/// Emits every diagnostic as a structured `warn` event, in order.
pub fn emit_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!(
            sheet = %diagnostic.sheet,
            row = diagnostic.row,
            column = diagnostic.column.as_deref(),
            kind = %diagnostic.kind(),
            "{}",
            diagnostic.issue
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(1).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(7).level, Level::TRACE);
        assert!(!LogConfig::from_verbosity(1).with_target);
    }

    #[test]
    fn test_default_directives_cover_workspace_crates() {
        let directives = default_directives(Level::DEBUG);
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("sheet_tree_core=debug"));
        assert!(directives.contains("sheet_tree_sqlite=debug"));
    }
}
