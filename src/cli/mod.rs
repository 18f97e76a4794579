//! Command-line parsing for the DEA ranking tool.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! configuration resolution (env / defaults, see `app`) and from the engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DEFAULT_TOLERANCE, InputFormat, Orientation, ReturnsToScale};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dea", version, about = "Rank units by Data Envelopment Analysis efficiency")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score units and print two JSON lines: ranked scores, then efficient identifiers.
    Score(RunArgs),
    /// Score units and print a readable ranking with peers, slacks and a summary.
    Report(RunArgs),
}

/// Options shared by `score` and `report`.
///
/// Column and model options fall back to `DEA_*` environment variables
/// (a `.env` file is honoured) and then to built-in defaults.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Read records from this file instead of standard input.
    #[arg(short = 'f', long = "input", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Record format.
    #[arg(long, value_enum, default_value_t = InputFormat::Json)]
    pub format: InputFormat,

    /// Identifier column [env: DEA_ID_COLUMN] [default: country].
    #[arg(long)]
    pub id_column: Option<String>,

    /// Comma-separated input columns [env: DEA_INPUT_COLUMNS].
    #[arg(long, value_delimiter = ',')]
    pub inputs: Option<Vec<String>>,

    /// Comma-separated output columns [env: DEA_OUTPUT_COLUMNS].
    #[arg(long, value_delimiter = ',')]
    pub outputs: Option<Vec<String>>,

    /// Radial orientation [env: DEA_ORIENTATION] [default: input].
    #[arg(long, value_enum)]
    pub orientation: Option<Orientation>,

    /// Returns-to-scale assumption [env: DEA_RTS] [default: crs].
    #[arg(long, value_enum)]
    pub rts: Option<ReturnsToScale>,

    /// Tolerance for treating a score as efficient and a weight as a peer.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE, allow_negative_numbers = true)]
    pub tolerance: f64,

    /// Maximum concurrent solves [env: DEA_WORKERS] [default: available cores].
    #[arg(long)]
    pub workers: Option<usize>,

    /// Rows shown by `report` (0 shows all).
    #[arg(long, default_value_t = 0)]
    pub top: usize,

    /// Also write per-unit results to this CSV file.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Log filter (e.g. `debug`, or a full `RUST_LOG` directive). Logs go to stderr.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_lists_and_model_flags() {
        let cli = Cli::parse_from([
            "dea",
            "report",
            "--inputs",
            "a,b",
            "--outputs",
            "y",
            "--orientation",
            "output",
            "--rts",
            "vrs",
            "--workers",
            "3",
        ]);
        let Command::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.inputs, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(args.outputs, Some(vec!["y".to_string()]));
        assert_eq!(args.orientation, Some(Orientation::Output));
        assert_eq!(args.rts, Some(ReturnsToScale::Vrs));
        assert_eq!(args.workers, Some(3));
        assert_eq!(args.format, InputFormat::Json);
        assert_eq!(args.tolerance, DEFAULT_TOLERANCE);
    }

    #[test]
    fn negative_tolerance_parses_for_later_validation() {
        let cli = Cli::try_parse_from(["dea", "score", "--tolerance", "-1"]).unwrap();
        let Command::Score(args) = cli.command else {
            panic!("expected score");
        };
        assert_eq!(args.tolerance, -1.0);
    }

    #[test]
    fn score_defaults_leave_config_to_env() {
        let cli = Cli::parse_from(["dea", "score"]);
        let Command::Score(args) = cli.command else {
            panic!("expected score");
        };
        assert!(args.input.is_none());
        assert!(args.inputs.is_none());
        assert!(args.orientation.is_none());
        assert_eq!(args.top, 0);
    }
}
