//! CLI argument definitions for docpipe.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "docpipe",
    version,
    about = "Run transformation pipelines over tabular documents",
    long_about = "Load a CSV or JSON table into a document, run a pipeline of \
                  filter, sort, limit, group_by and add_column steps over it, \
                  and print the result.\n\n\
                  Pipelines are JSON files; see `docpipe run --help`."
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
    /// Run a pipeline over a table and print the result.
    Run(RunArgs),

    /// Parse and validate a pipeline file without running it.
    Check(CheckArgs),

    /// List the aggregate functions pipelines can use.
    Aggregates,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Input table (.csv or .json).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Pipeline definition (JSON). Without one the table is printed as loaded.
    #[arg(long = "pipeline", short = 'p', value_name = "FILE")]
    pub pipeline: Option<PathBuf>,

    /// Output format.
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,

    /// Document title.
    #[arg(long = "title")]
    pub title: Option<String>,

    /// Maximum number of pipeline operations (overrides the pipeline file).
    #[arg(long = "max-ops", value_name = "N")]
    pub max_ops: Option<usize>,

    /// Execution time limit in milliseconds (overrides the pipeline file).
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Merge adjacent filter steps into one pass.
    #[arg(long = "fuse-filters")]
    pub fuse_filters: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Pipeline definition (JSON).
    #[arg(value_name = "FILE")]
    pub pipeline: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    /// Terminal table.
    Table,
    /// Pretty JSON array of records.
    Json,
    /// One-line JSON array of records.
    JsonCompact,
    /// The whole document, schema and transformation log included.
    Document,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
