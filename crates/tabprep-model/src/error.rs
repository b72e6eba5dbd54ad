use thiserror::Error;

use crate::schema::VariableKind;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid column name: {0:?}")]
    InvalidColumnName(String),
    #[error("duplicate column {name} in {kind} group")]
    DuplicateColumn { name: String, kind: VariableKind },
    #[error("column {name} appears in more than one schema group")]
    ColumnInMultipleGroups { name: String },
    #[error("unknown columns: {}", missing.join(", "))]
    UnknownColumns { missing: Vec<String> },
    #[error("selector {selector} matched no columns among: {}", candidates.join(", "))]
    EmptySelection {
        selector: String,
        candidates: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
