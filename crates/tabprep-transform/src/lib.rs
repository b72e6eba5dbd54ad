//! Schema-driven feature preprocessing for tabular datasets.
//!
//! The crate separates **what** a preprocessing pipeline does from **what it
//! learned about a particular dataset**:
//!
//! - [`OpSpec`] is a stateless, serializable operator descriptor (which
//!   transform, which columns, how outputs are named).
//! - [`Phase`] composes operators for one variable kind; [`Workflow`] binds
//!   phases to a declared [`tabprep_model::Schema`].
//! - [`StatsContext`] holds the statistics a workflow's operators need,
//!   captured in a single fitting pass over a dataset's batches.
//!
//! The same workflow can be fitted against any dataset, and any fitted
//! context can later be replayed against new batches of the same shape.

pub mod error;
pub mod executors;
pub mod op;
pub mod stats;
pub mod workflow;

pub use error::{StatsError, TransformError};
pub use op::{OpKind, OpSpec, OutputPolicy};
pub use stats::{CategoryEncoder, ColumnStats, Moments, Range, StatKind, StatsContext};
pub use workflow::{Phase, PhaseKind, PlannedOp, Workflow};
