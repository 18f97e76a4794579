//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves configuration (flags, then `DEA_*` env / `.env`, then defaults)
//! - initialises logging on stderr
//! - runs the load -> score -> rank pipeline
//! - writes the JSON payload or the readable report, plus optional exports

use std::io::{IsTerminal, Write};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, RunArgs};
use crate::domain::{DeaConfig, EngineOptions, Orientation, ReturnsToScale};
use crate::error::AppError;

pub mod pipeline;

/// Identifier column used when none is configured.
pub const DEFAULT_ID_COLUMN: &str = "country";

/// Media-freedom input indicators used when none are configured.
pub const DEFAULT_INPUT_COLUMNS: [&str; 3] = [
    "freedom_expression_i",
    "freedom_expression_ii",
    "freedom_expression_iii",
];

/// Media-freedom output indicators used when none are configured.
pub const DEFAULT_OUTPUT_COLUMNS: [&str; 2] = ["media_freedom_rsf_index", "media_freedom_ii"];

/// Entry point for the `dea` binary.
pub fn run() -> Result<(), AppError> {
    // `dea` and `dea --inputs ...` behave like `dea score ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    dotenvy::dotenv().ok();

    match cli.command {
        Command::Score(args) => handle_run(args, OutputMode::Payload),
        Command::Report(args) => handle_run(args, OutputMode::Report),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Payload,
    Report,
}

fn handle_run(args: RunArgs, mode: OutputMode) -> Result<(), AppError> {
    init_tracing(args.log_level.as_deref());

    let config = dea_config_from_args(&args, |key| std::env::var(key).ok())?;
    let output = pipeline::run_dea(&config)?;

    match mode {
        OutputMode::Payload => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            crate::io::export::write_payload(
                &mut out,
                &output.rankings,
                &config.id_column,
                &output.ingest.id_values,
            )?;
        }
        OutputMode::Report => {
            let mut text = crate::report::format_run_summary(&output.ingest, &output.run, &output.rankings, &config);
            text.push_str(&crate::report::format_rankings(&output.rankings, config.top_n));
            let slacks = crate::report::format_slacks(
                &output.rankings,
                output.ingest.table.input_names(),
                output.ingest.table.output_names(),
            );
            if !slacks.is_empty() {
                text.push('\n');
                text.push_str(&slacks);
            }
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            write!(out, "{text}").map_err(|e| AppError::new(2, format!("Failed to write report: {e}")))?;
        }
    }

    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &output.rankings)?;
    }

    if !output.rankings.failed.is_empty() {
        eprintln!(
            "warning: {} unit(s) failed to solve and are reported with a null score: {}",
            output.rankings.failed.len(),
            output.rankings.failed.join(", ")
        );
    }

    Ok(())
}

/// Install the stderr log subscriber. Safe to call more than once.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(directive) if directive.contains('=') || directive.contains(',') => EnvFilter::new(directive),
        Some(level) => EnvFilter::new(format!("dea_rank={level}")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dea_rank=info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(colour_logs(&std::io::stderr()))
        .with_target(false)
        .try_init();
}

/// Escape codes only when the log stream is an interactive terminal.
fn colour_logs(stream: &impl IsTerminal) -> bool {
    stream.is_terminal()
}

/// Resolve the run configuration: flag, else environment, else default.
///
/// `env` is injected so resolution can be tested without touching the
/// process environment.
pub fn dea_config_from_args(args: &RunArgs, env: impl Fn(&str) -> Option<String>) -> Result<DeaConfig, AppError> {
    let id_column = args
        .id_column
        .clone()
        .or_else(|| env("DEA_ID_COLUMN"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string());
    if id_column.is_empty() {
        return Err(AppError::new(2, "Identifier column name must not be empty."));
    }

    let input_columns = resolve_columns(args.inputs.as_deref(), env("DEA_INPUT_COLUMNS"), &DEFAULT_INPUT_COLUMNS, "input")?;
    let output_columns =
        resolve_columns(args.outputs.as_deref(), env("DEA_OUTPUT_COLUMNS"), &DEFAULT_OUTPUT_COLUMNS, "output")?;

    if let Some(col) = input_columns.iter().find(|c| output_columns.contains(c)) {
        return Err(AppError::new(2, format!("Column `{col}` is configured as both input and output.")));
    }
    if input_columns.contains(&id_column) || output_columns.contains(&id_column) {
        return Err(AppError::new(
            2,
            format!("Identifier column `{id_column}` cannot also be a measurement column."),
        ));
    }

    let orientation = match args.orientation {
        Some(o) => o,
        None => env_enum::<Orientation>(&env, "DEA_ORIENTATION")?.unwrap_or(Orientation::Input),
    };
    let returns_to_scale = match args.rts {
        Some(r) => r,
        None => env_enum::<ReturnsToScale>(&env, "DEA_RTS")?.unwrap_or(ReturnsToScale::Crs),
    };

    let workers = match args.workers {
        Some(w) => Some(w),
        None => match env("DEA_WORKERS") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| AppError::new(2, format!("Invalid DEA_WORKERS '{raw}': expected a positive integer.")))?,
            ),
            None => None,
        },
    };
    if workers == Some(0) {
        return Err(AppError::new(2, "Worker count must be at least 1."));
    }

    if !(args.tolerance.is_finite() && args.tolerance > 0.0) {
        return Err(AppError::new(2, "Invalid --tolerance: must be finite and > 0."));
    }

    Ok(DeaConfig {
        input_path: args.input.clone(),
        format: args.format,
        id_column,
        input_columns,
        output_columns,
        engine: EngineOptions {
            orientation,
            returns_to_scale,
            tolerance: args.tolerance,
            workers,
        },
        top_n: args.top,
        export_results: args.export.clone(),
    })
}

fn resolve_columns(
    flag: Option<&[String]>,
    env_value: Option<String>,
    defaults: &[&str],
    role: &str,
) -> Result<Vec<String>, AppError> {
    let columns: Vec<String> = match (flag, env_value) {
        (Some(cols), _) => cols.iter().map(|c| c.trim().to_string()).collect(),
        (None, Some(raw)) => raw.split(',').map(|c| c.trim().to_string()).collect(),
        (None, None) => defaults.iter().map(|c| c.to_string()).collect(),
    };

    if columns.is_empty() || columns.iter().any(String::is_empty) {
        return Err(AppError::new(2, format!("Empty {role} column name in configuration.")));
    }
    for (i, col) in columns.iter().enumerate() {
        if columns[..i].contains(col) {
            return Err(AppError::new(2, format!("Duplicate {role} column `{col}`.")));
        }
    }
    Ok(columns)
}

fn env_enum<T: ValueEnum>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError> {
    let Some(raw) = env(key) else {
        return Ok(None);
    };
    T::from_str(raw.trim(), true)
        .map(Some)
        .map_err(|e| AppError::new(2, format!("Invalid {key} '{raw}': {e}")))
}

/// Rewrite argv so `dea` defaults to `dea score`.
///
/// Rules:
/// - `dea`                      -> `dea score`
/// - `dea --inputs a,b ...`     -> `dea score --inputs a,b ...`
/// - `dea --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("score".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "score" | "report");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "score".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["dea", "score"];
        argv.extend_from_slice(extra);
        let cli = crate::cli::Cli::try_parse_from(argv).unwrap_or_else(|e| panic!("argv rejected: {e}"));
        match cli.command {
            Command::Score(a) | Command::Report(a) => a,
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_media_freedom_columns() {
        let config = dea_config_from_args(&args(&[]), env_of(&[])).unwrap();
        assert_eq!(config.id_column, "country");
        assert_eq!(config.input_columns, strings(&DEFAULT_INPUT_COLUMNS));
        assert_eq!(config.output_columns, strings(&DEFAULT_OUTPUT_COLUMNS));
        assert_eq!(config.engine.orientation, Orientation::Input);
        assert_eq!(config.engine.returns_to_scale, ReturnsToScale::Crs);
        assert!(config.engine.workers.is_none());
        assert!(config.input_path.is_none());
    }

    #[test]
    fn env_fills_in_missing_flags() {
        let env = env_of(&[
            ("DEA_ID_COLUMN", "unit"),
            ("DEA_INPUT_COLUMNS", "a, b"),
            ("DEA_OUTPUT_COLUMNS", "y"),
            ("DEA_ORIENTATION", "OUTPUT"),
            ("DEA_RTS", "vrs"),
            ("DEA_WORKERS", "2"),
        ]);
        let config = dea_config_from_args(&args(&[]), env).unwrap();
        assert_eq!(config.id_column, "unit");
        assert_eq!(config.input_columns, strings(&["a", "b"]));
        assert_eq!(config.output_columns, strings(&["y"]));
        assert_eq!(config.engine.orientation, Orientation::Output);
        assert_eq!(config.engine.returns_to_scale, ReturnsToScale::Vrs);
        assert_eq!(config.engine.workers, Some(2));
    }

    #[test]
    fn flags_win_over_env() {
        let env = env_of(&[("DEA_INPUT_COLUMNS", "a,b"), ("DEA_ORIENTATION", "output")]);
        let config = dea_config_from_args(&args(&["--inputs", "c", "--orientation", "input"]), env).unwrap();
        assert_eq!(config.input_columns, strings(&["c"]));
        assert_eq!(config.engine.orientation, Orientation::Input);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let err = dea_config_from_args(&args(&["--inputs", "a", "--outputs", "a"]), env_of(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = dea_config_from_args(&args(&["--inputs", "a,a"]), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));

        let err = dea_config_from_args(&args(&["--workers", "0"]), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("at least 1"));

        let err = dea_config_from_args(&args(&["--tolerance", "-1"]), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("tolerance"));

        let err = dea_config_from_args(&args(&["--tolerance=0"]), env_of(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = dea_config_from_args(&args(&[]), env_of(&[("DEA_RTS", "cubic")])).unwrap_err();
        assert!(err.to_string().contains("DEA_RTS"));

        let err = dea_config_from_args(&args(&["--id-column", "fe", "--inputs", "fe"]), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("Identifier column"));
    }

    #[test]
    fn redirected_logs_are_not_coloured() {
        let path = std::env::temp_dir().join(format!("dea_log_{}.txt", std::process::id()));
        let file = std::fs::File::create(&path).unwrap();
        assert!(!colour_logs(&file));
        drop(file);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn bare_invocation_defaults_to_score() {
        assert_eq!(rewrite_args(strings(&["dea"])), strings(&["dea", "score"]));
        assert_eq!(
            rewrite_args(strings(&["dea", "--rts", "vrs"])),
            strings(&["dea", "score", "--rts", "vrs"])
        );
        assert_eq!(rewrite_args(strings(&["dea", "report"])), strings(&["dea", "report"]));
        assert_eq!(rewrite_args(strings(&["dea", "--help"])), strings(&["dea", "--help"]));
    }
}
