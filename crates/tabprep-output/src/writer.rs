//! Parquet sink for transformed datasets.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::{DataFrame, ParquetWriter};
use tracing::{debug, info};

use tabprep_ingest::Dataset;

/// What a write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub rows: usize,
    pub batches: usize,
    pub path: PathBuf,
}

/// Writes a dataset's batches to a single Parquet file.
///
/// The dataset applies its bound workflow (if any) during iteration, so the
/// writer only has to drain batches. With a shuffle seed set, each batch's
/// rows are permuted deterministically before writing.
#[derive(Debug, Clone)]
pub struct Writer {
    path: PathBuf,
    shuffle_seed: Option<u64>,
}

impl Writer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            shuffle_seed: None,
        }
    }

    /// Shuffle rows within each batch before writing. The seed is offset by
    /// the batch index so batches draw distinct permutations while the whole
    /// write stays reproducible.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, dataset: &Dataset) -> Result<WriteReport> {
        let mut combined: Option<DataFrame> = None;
        let mut batches = 0usize;

        for (index, batch) in dataset.iter().enumerate() {
            let mut batch = batch?;
            if let Some(seed) = self.shuffle_seed {
                batch = batch
                    .sample_n_literal(batch.height(), false, true, Some(seed + index as u64))
                    .context("shuffling batch")?;
            }
            debug!(batch = index, rows = batch.height(), "collected batch");
            batches += 1;
            combined = Some(match combined {
                None => batch,
                Some(acc) => acc.vstack(&batch).context("stacking batch")?,
            });
        }

        // An empty dataset still produces a schema-correct, zero-row file.
        let mut combined = match combined {
            Some(df) => df,
            None => dataset.empty_batch()?,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let file = File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        ParquetWriter::new(file)
            .finish(&mut combined)
            .with_context(|| format!("writing {}", self.path.display()))?;

        let report = WriteReport {
            rows: combined.height(),
            batches,
            path: self.path.clone(),
        };
        info!(
            path = %report.path.display(),
            rows = report.rows,
            batches = report.batches,
            "wrote parquet output"
        );
        Ok(report)
    }
}
