use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use comfy_table::Table;
use docpipe_model::{Document, TableContent};
use docpipe_transform::{AggregateRegistry, DocumentPipelineExt, PipelineSpec};
use tracing::{debug, info, info_span};

use crate::cli::{CheckArgs, OutputFormatArg, RunArgs};
use docpipe_cli::input::load_table;
use docpipe_cli::render::{
    apply_table_style, header_cell, rows_json, rows_json_compact, table_view,
    transformation_summary,
};

/// What a `run` produced.
pub struct RunResult {
    pub document: Document,
    pub format: OutputFormatArg,
    pub elapsed: Duration,
}

impl RunResult {
    fn table(&self) -> Result<&TableContent> {
        self.document
            .first_table()
            .map(|(_, table)| table)
            .ok_or_else(|| anyhow!("document has no table"))
    }
}

fn load_spec(path: &Path) -> Result<PipelineSpec> {
    let text = fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    PipelineSpec::from_json(&text).with_context(|| format!("load pipeline {}", path.display()))
}

pub fn run_pipeline(args: &RunArgs) -> Result<RunResult> {
    let table = load_table(&args.input)?;
    let span = info_span!("run", table_id = %table.id);
    let _guard = span.enter();

    let mut builder = Document::builder(table.id.clone());
    if let Some(title) = &args.title {
        builder = builder.title(title.clone());
    }
    let document = builder.table(table).build();

    let mut spec = match &args.pipeline {
        Some(path) => load_spec(path)?,
        None => PipelineSpec::default(),
    };
    if let Some(max) = args.max_ops {
        spec.options = spec.options.with_max_operations(max);
    }
    if let Some(ms) = args.timeout_ms {
        spec.options = spec
            .options
            .with_max_execution_time(Duration::from_millis(ms));
    }
    if args.fuse_filters {
        spec.options = spec.options.with_fuse_filters(true);
    }
    debug!(steps = spec.steps.len(), options = ?spec.options, "pipeline loaded");

    let registry = AggregateRegistry::builtin();
    let start = Instant::now();
    let document = spec
        .apply_to(document.pipeline(), &registry)?
        .execute()
        .context("run pipeline")?;
    let elapsed = start.elapsed();
    info!(duration_ms = elapsed.as_millis(), "run complete");

    Ok(RunResult {
        document,
        format: args.format,
        elapsed,
    })
}

pub fn print_result(result: &RunResult) -> Result<()> {
    let table = result.table()?;
    match result.format {
        OutputFormatArg::Table => {
            if let Some(title) = &result.document.title {
                println!("{title}");
            }
            println!("{}", table_view(table));
            println!(
                "{} rows, {} ({} ms)",
                table.record_count(),
                transformation_summary(&table.transformations),
                result.elapsed.as_millis()
            );
        }
        OutputFormatArg::Json => println!("{}", rows_json(table)?),
        OutputFormatArg::JsonCompact => println!("{}", rows_json_compact(table)?),
        OutputFormatArg::Document => {
            println!("{}", serde_json::to_string_pretty(&result.document)?);
        }
    }
    Ok(())
}

/// Parse a pipeline file and validate each step without loading any data.
pub fn run_check(args: &CheckArgs) -> Result<()> {
    let spec = load_spec(&args.pipeline)?;
    let operations = spec
        .validate(&AggregateRegistry::builtin())
        .with_context(|| format!("check {}", args.pipeline.display()))?;

    let mut table = Table::new();
    table.set_header(vec![header_cell("#"), header_cell("Operation"), header_cell("Detail")]);
    apply_table_style(&mut table);
    for (index, operation) in operations.iter().enumerate() {
        table.add_row(vec![
            index.to_string(),
            operation.name().to_string(),
            operation.describe().unwrap_or_default(),
        ]);
    }
    println!("{table}");
    println!("{}: ok", args.pipeline.display());
    Ok(())
}

pub fn run_aggregates() {
    let registry = AggregateRegistry::builtin();
    let mut table = Table::new();
    table.set_header(vec![header_cell("Aggregate")]);
    apply_table_style(&mut table);
    for name in registry.names() {
        table.add_row(vec![name]);
    }
    println!("{table}");
}
