//! Output sinks and persistence for tabprep.
//!
//! [`Writer`] drains a (possibly workflow-bound) dataset into a single
//! Parquet file. The [`snapshot`] module persists workflows and fitted
//! stats contexts as versioned, fingerprinted JSON so a fit can be replayed
//! long after the process that produced it is gone.

pub mod snapshot;
pub mod writer;

pub use snapshot::{
    SnapshotError, load_stats, load_workflow, save_stats, save_workflow,
};
pub use writer::{WriteReport, Writer};
