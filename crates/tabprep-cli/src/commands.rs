use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use comfy_table::Table;
use tracing::info_span;

use tabprep_ingest::{Dataset, ReadOptions};
use tabprep_output::{Writer, load_stats, load_workflow, save_stats};
use tabprep_transform::{OpKind, StatsContext};

use crate::cli::{FitArgs, TransformArgs};
use crate::summary::apply_table_style;

/// Result of a `fit` run, for summary rendering.
pub struct FitOutcome {
    pub stats: StatsContext,
    pub out: PathBuf,
}

/// Result of a `transform` run, for summary rendering.
pub struct TransformOutcome {
    pub rows: usize,
    pub batches: usize,
    pub out: PathBuf,
    pub output_columns: Vec<String>,
}

pub fn run_fit(args: &FitArgs) -> Result<FitOutcome> {
    let span = info_span!("fit", data = %args.data.display());
    let _guard = span.enter();

    let workflow = load_workflow(&args.workflow)
        .with_context(|| format!("loading workflow {}", args.workflow.display()))?;
    workflow.plan().context("validating workflow")?;

    let options = read_options(args.batch_size, args.delimiter)?;
    let dataset = Dataset::from_csv(&args.data, &options)?;
    dataset.require_columns(&workflow.schema().all_columns())?;

    let mut stats = match (&args.stats, args.warm_start) {
        (Some(path), true) => load_stats(path)
            .with_context(|| format!("loading statistics {}", path.display()))?,
        _ => StatsContext::new(),
    };
    stats.fit(&workflow, dataset.batches(), args.warm_start)?;
    save_stats(&args.out, &stats)?;

    Ok(FitOutcome {
        stats,
        out: args.out.clone(),
    })
}

pub fn run_transform(args: &TransformArgs) -> Result<TransformOutcome> {
    let span = info_span!("transform", data = %args.data.display());
    let _guard = span.enter();

    let workflow = load_workflow(&args.workflow)
        .with_context(|| format!("loading workflow {}", args.workflow.display()))?;
    let stats = load_stats(&args.stats)
        .with_context(|| format!("loading statistics {}", args.stats.display()))?;
    stats.validate_for(&workflow)?;

    let options = read_options(args.batch_size, args.delimiter)?;
    let dataset = Dataset::from_csv(&args.data, &options)?;
    dataset.require_columns(&workflow.schema().all_columns())?;

    let output_columns: Vec<String> = workflow
        .columns()
        .iter()
        .map(ToString::to_string)
        .collect();
    let mapped = dataset.map(workflow, Some(stats));

    let mut writer = Writer::new(&args.out);
    if let Some(seed) = args.shuffle_seed {
        writer = writer.with_shuffle(seed);
    }
    let report = writer.write(&mapped)?;

    Ok(TransformOutcome {
        rows: report.rows,
        batches: report.batches,
        out: report.path,
        output_columns,
    })
}

pub fn run_ops() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Op", "Acts on", "Requires", "Description"]);
    apply_table_style(&mut table);
    for kind in OpKind::ALL {
        let requires: Vec<String> = kind
            .required_stats()
            .iter()
            .map(ToString::to_string)
            .collect();
        table.add_row(vec![
            kind.id_stem().to_string(),
            kind.default_kind().to_string(),
            if requires.is_empty() {
                "-".to_string()
            } else {
                requires.join(", ")
            },
            kind.description().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn read_options(batch_size: usize, delimiter: char) -> Result<ReadOptions> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {delimiter:?}");
    }
    Ok(ReadOptions::default()
        .with_batch_size(batch_size)
        .with_delimiter(delimiter as u8))
}
