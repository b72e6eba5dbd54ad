//! Dataset ingestion: CSV loading and batched iteration.

pub mod dataset;
pub mod error;

pub use dataset::{Batches, DEFAULT_BATCH_SIZE, Dataset, ReadOptions, TransformedBatches};
pub use error::IngestError;
