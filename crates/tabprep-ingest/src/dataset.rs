//! Batched datasets.
//!
//! A [`Dataset`] is an eagerly-loaded table plus a batch size. Iteration
//! yields fixed-size row slices; binding a workflow (and optionally a fitted
//! stats context) with [`Dataset::map`] makes iteration yield transformed
//! batches instead, which is how the same dataset serves both the fitting
//! pass (raw batches) and the transform pass.

use std::path::{Path, PathBuf};

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use serde::{Deserialize, Serialize};
use tracing::info;

use tabprep_model::ColumnName;
use tabprep_transform::{StatsContext, Workflow};

use crate::error::IngestError;

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Options for reading a CSV-backed dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Rows per batch. Must be at least 1.
    pub batch_size: usize,
    /// Whether the first row is a header. Defaults to true.
    pub has_header: bool,
    /// Field separator. Defaults to `,`.
    pub delimiter: u8,
    /// Number of rows used for dtype inference. Defaults to 1000.
    pub infer_schema_rows: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            has_header: true,
            delimiter: b',',
            infer_schema_rows: 1000,
        }
    }
}

impl ReadOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_infer_schema_rows(mut self, rows: usize) -> Self {
        self.infer_schema_rows = rows;
        self
    }
}

/// A batched view over raw records, optionally bound to a workflow.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    batch_size: usize,
    source: Option<PathBuf>,
    workflow: Option<Workflow>,
    stats: Option<StatsContext>,
}

impl Dataset {
    /// Load a CSV file.
    ///
    /// The header row is probed with a plain CSV reader first so an empty or
    /// headerless file fails with a precise error, then the data is loaded
    /// through Polars.
    pub fn from_csv(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self, IngestError> {
        let path = path.as_ref();
        if options.batch_size == 0 {
            return Err(IngestError::InvalidBatchSize);
        }

        let mut probe = csv::ReaderBuilder::new()
            .has_headers(options.has_header)
            .delimiter(options.delimiter)
            .from_path(path)
            .map_err(|source| IngestError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        if options.has_header {
            let headers = probe.headers().map_err(|source| IngestError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
                return Err(IngestError::MissingHeader {
                    path: path.to_path_buf(),
                });
            }
        }
        drop(probe);

        let frame = CsvReadOptions::default()
            .with_has_header(options.has_header)
            .with_infer_schema_length(Some(options.infer_schema_rows))
            .map_parse_options(|parse| parse.with_separator(options.delimiter))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        info!(
            path = %path.display(),
            rows = frame.height(),
            columns = frame.width(),
            batch_size = options.batch_size,
            "loaded csv dataset"
        );

        Ok(Self {
            frame,
            batch_size: options.batch_size,
            source: Some(path.to_path_buf()),
            workflow: None,
            stats: None,
        })
    }

    /// Wrap an in-memory frame.
    pub fn from_frame(frame: DataFrame, batch_size: usize) -> Result<Self, IngestError> {
        if batch_size == 0 {
            return Err(IngestError::InvalidBatchSize);
        }
        Ok(Self {
            frame,
            batch_size,
            source: None,
            workflow: None,
            stats: None,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches one iteration yields; 0 for an empty dataset.
    pub fn num_batches(&self) -> usize {
        match self.frame.height() {
            0 => 0,
            rows => (rows - 1) / self.batch_size + 1,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Column names of the raw (untransformed) records.
    pub fn schema_columns(&self) -> Vec<String> {
        self.frame
            .get_column_names_owned()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Check that every required column is present in the raw records.
    pub fn require_columns(&self, columns: &[ColumnName]) -> Result<(), IngestError> {
        let present = self.schema_columns();
        let missing: Vec<String> = columns
            .iter()
            .filter(|c| !present.iter().any(|p| p == c.as_str()))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::MissingColumns { missing })
        }
    }

    /// Bind a workflow (and optional fitted stats) so iteration applies the
    /// transforms per batch. Rebinding replaces any previous binding.
    pub fn map(mut self, workflow: Workflow, stats: Option<StatsContext>) -> Self {
        self.workflow = Some(workflow);
        self.stats = stats;
        self
    }

    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    /// Raw, untransformed batches. Each call starts over from batch 0.
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            dataset: self,
            index: 0,
        }
    }

    /// Batches with the bound workflow applied (raw batches if unbound).
    pub fn iter(&self) -> TransformedBatches<'_> {
        TransformedBatches {
            inner: self.batches(),
            workflow: self.workflow.as_ref(),
            stats: self.stats.as_ref(),
        }
    }

    /// A zero-row frame with the shape iteration would produce.
    ///
    /// Lets a sink write a schema-correct empty output for an empty dataset.
    pub fn empty_batch(&self) -> anyhow::Result<DataFrame> {
        let mut df = self.frame.slice(0, 0);
        if let Some(workflow) = &self.workflow {
            workflow.apply(&mut df, self.stats.as_ref())?;
        }
        Ok(df)
    }
}

/// Iterator of raw row slices.
pub struct Batches<'a> {
    dataset: &'a Dataset,
    index: usize,
}

impl Iterator for Batches<'_> {
    type Item = DataFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.dataset.num_batches() {
            return None;
        }
        let offset = (self.index * self.dataset.batch_size) as i64;
        let batch = self.dataset.frame.slice(offset, self.dataset.batch_size);
        self.index += 1;
        Some(batch)
    }
}

/// Iterator of batches with the bound workflow applied.
pub struct TransformedBatches<'a> {
    inner: Batches<'a>,
    workflow: Option<&'a Workflow>,
    stats: Option<&'a StatsContext>,
}

impl Iterator for TransformedBatches<'_> {
    type Item = anyhow::Result<DataFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = self.inner.next()?;
        if let Some(workflow) = self.workflow {
            if let Err(error) = workflow.apply(&mut batch, self.stats) {
                return Some(Err(error));
            }
        }
        Some(Ok(batch))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use polars::df;

    use tabprep_model::Schema;
    use tabprep_transform::{OpKind, OpSpec, Phase, PhaseKind};

    use super::*;

    fn write_csv(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn batch_arithmetic() {
        let frame = df!("x" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
        let dataset = Dataset::from_frame(frame, 4).unwrap();
        assert_eq!(dataset.num_batches(), 3);
        let sizes: Vec<usize> = dataset.batches().map(|b| b.height()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn oversized_batch_yields_one_batch() {
        let frame = df!("x" => [1i64, 2, 3]).unwrap();
        let dataset = Dataset::from_frame(frame, 100).unwrap();
        assert_eq!(dataset.num_batches(), 1);
        assert_eq!(dataset.batches().next().unwrap().height(), 3);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let frame = df!("x" => [1i64]).unwrap();
        assert!(matches!(
            Dataset::from_frame(frame, 0),
            Err(IngestError::InvalidBatchSize)
        ));
    }

    #[test]
    fn iteration_restarts_each_call() {
        let frame = df!("x" => [1i64, 2, 3]).unwrap();
        let dataset = Dataset::from_frame(frame, 2).unwrap();
        assert_eq!(dataset.batches().count(), 2);
        assert_eq!(dataset.batches().count(), 2);
    }

    #[test]
    fn csv_round_trip_with_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "data.csv", "a;b\n1;x\n2;y\n3;z\n");
        let options = ReadOptions::default()
            .with_batch_size(2)
            .with_delimiter(b';');
        let dataset = Dataset::from_csv(&path, &options).unwrap();
        assert_eq!(dataset.num_rows(), 3);
        assert_eq!(dataset.num_batches(), 2);
        assert_eq!(dataset.schema_columns(), vec!["a", "b"]);
    }

    #[test]
    fn header_only_csv_yields_no_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "empty.csv", "a,b\n");
        let dataset = Dataset::from_csv(&path, &ReadOptions::default()).unwrap();
        assert_eq!(dataset.num_rows(), 0);
        assert_eq!(dataset.num_batches(), 0);
        assert_eq!(dataset.batches().count(), 0);
    }

    #[test]
    fn empty_file_is_a_missing_header_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "nothing.csv", "");
        let err = Dataset::from_csv(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::MissingHeader { .. }));
    }

    #[test]
    fn require_columns_reports_missing_names() {
        let frame = df!("a" => [1i64]).unwrap();
        let dataset = Dataset::from_frame(frame, 1).unwrap();
        let wanted = vec![
            ColumnName::new("a").unwrap(),
            ColumnName::new("b").unwrap(),
        ];
        match dataset.require_columns(&wanted).unwrap_err() {
            IngestError::MissingColumns { missing } => assert_eq!(missing, vec!["b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mapped_dataset_yields_transformed_batches() {
        let workflow = Workflow::new(
            Schema::from_names(&[], &["x"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Log)],
        ))
        .unwrap();

        let frame = df!("x" => [1.0f64, 1.0, 1.0]).unwrap();
        let dataset = Dataset::from_frame(frame, 2).unwrap().map(workflow, None);
        for batch in dataset.iter() {
            let batch = batch.unwrap();
            let values: Vec<Option<f64>> =
                batch.column("x").unwrap().f64().unwrap().into_iter().collect();
            assert!(values.iter().all(|v| *v == Some(0.0)));
        }
    }
}
