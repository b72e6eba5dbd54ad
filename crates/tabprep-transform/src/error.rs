use thiserror::Error;

use tabprep_model::ModelError;

use crate::stats::StatKind;

/// Errors raised while composing or applying workflows.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("operator {op} in phase {phase}: {source}")]
    InvalidSelection {
        op: String,
        phase: String,
        #[source]
        source: ModelError,
    },
    #[error("operator {op} acts on {op_kind} columns but phase {phase} is {phase_kind}")]
    PhaseKindMismatch {
        phase: String,
        phase_kind: String,
        op: String,
        op_kind: String,
    },
    #[error("operator {op} requires fitted {stat} statistics but no stats context was provided")]
    MissingStats { op: String, stat: StatKind },
    #[error("stats context has no state for operator {op}")]
    UnfittedOp { op: String },
    #[error("stats context has no {stat} state for operator {op} on column {column}")]
    MissingColumnStats {
        op: String,
        column: String,
        stat: StatKind,
    },
}

/// Errors raised by the statistics fitting pass.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("cannot fit statistics over an empty dataset")]
    EmptyDataset,
    #[error(
        "operator {op} selects column {column}, which an earlier operator \
         consumed during fitting"
    )]
    ColumnConsumed { op: String, column: String },
    #[error("warm start requested but no state exists for operator {op} on column {column}")]
    WarmStartIncomplete { op: String, column: String },
}
