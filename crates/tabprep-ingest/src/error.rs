use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} has no usable header row", path.display())]
    MissingHeader { path: PathBuf },
    #[error("dataset is missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}
