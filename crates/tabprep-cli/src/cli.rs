//! CLI argument definitions for tabprep.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "tabprep",
    version,
    about = "Schema-driven feature preprocessing for tabular datasets",
    long_about = "Fit per-dataset statistics for a preprocessing workflow, then\n\
                  apply the workflow batch-by-batch and write Parquet output.\n\
                  Workflows and fitted statistics persist as JSON snapshots."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fit workflow statistics over a dataset and save the snapshot.
    Fit(FitArgs),

    /// Apply a fitted workflow to a dataset and write Parquet output.
    Transform(TransformArgs),

    /// List the supported operators.
    Ops,
}

#[derive(Parser)]
pub struct FitArgs {
    /// Path to the CSV dataset to fit against.
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Workflow snapshot to fit statistics for.
    #[arg(long = "workflow", value_name = "PATH")]
    pub workflow: PathBuf,

    /// Where to write the fitted statistics snapshot.
    #[arg(long = "out", value_name = "PATH")]
    pub out: PathBuf,

    /// Rows per batch during the fitting pass.
    #[arg(long = "batch-size", value_name = "N", default_value_t = tabprep_ingest::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// CSV field separator.
    #[arg(long = "delimiter", value_name = "CHAR", default_value = ",")]
    pub delimiter: char,

    /// Continue accumulating into an existing statistics snapshot.
    #[arg(long = "warm-start", requires = "stats")]
    pub warm_start: bool,

    /// Existing statistics snapshot to warm-start from.
    #[arg(long = "stats", value_name = "PATH")]
    pub stats: Option<PathBuf>,
}

#[derive(Parser)]
pub struct TransformArgs {
    /// Path to the CSV dataset to transform.
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Workflow snapshot to apply.
    #[arg(long = "workflow", value_name = "PATH")]
    pub workflow: PathBuf,

    /// Fitted statistics snapshot for the workflow.
    #[arg(long = "stats", value_name = "PATH")]
    pub stats: PathBuf,

    /// Where to write the Parquet output.
    #[arg(long = "out", value_name = "PATH")]
    pub out: PathBuf,

    /// Rows per batch during the transform pass.
    #[arg(long = "batch-size", value_name = "N", default_value_t = tabprep_ingest::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// CSV field separator.
    #[arg(long = "delimiter", value_name = "CHAR", default_value = ",")]
    pub delimiter: char,

    /// Shuffle rows within each batch with this seed before writing.
    #[arg(long = "shuffle-seed", value_name = "SEED")]
    pub shuffle_seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn warm_start_requires_stats() {
        let result = Cli::try_parse_from([
            "tabprep",
            "fit",
            "data.csv",
            "--workflow",
            "wf.json",
            "--out",
            "stats.json",
            "--warm-start",
        ]);
        assert!(result.is_err());
    }
}
