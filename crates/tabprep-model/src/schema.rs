//! Declared column groups of a tabular dataset.
//!
//! A [`Schema`] partitions the columns a workflow cares about into
//! categorical features, continuous features, and label columns. Labels are
//! carried through preprocessing untouched; operators select their inputs
//! from the categorical or continuous groups only.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ColumnName, ModelError};

/// The role a column plays in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Categorical,
    Continuous,
    Label,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Categorical => "categorical",
            Self::Continuous => "continuous",
            Self::Label => "label",
        };
        f.write_str(name)
    }
}

/// Column groups declared for a dataset.
///
/// Invariants enforced at construction: no duplicate name within a group and
/// no name shared between groups. Any group may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    categorical: Vec<ColumnName>,
    continuous: Vec<ColumnName>,
    labels: Vec<ColumnName>,
}

impl Schema {
    pub fn new(
        categorical: Vec<ColumnName>,
        continuous: Vec<ColumnName>,
        labels: Vec<ColumnName>,
    ) -> Result<Self, ModelError> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for (group, kind) in [
            (&categorical, VariableKind::Categorical),
            (&continuous, VariableKind::Continuous),
            (&labels, VariableKind::Label),
        ] {
            let mut in_group: BTreeSet<&str> = BTreeSet::new();
            for name in group {
                if !in_group.insert(name.as_str()) {
                    return Err(ModelError::DuplicateColumn {
                        name: name.to_string(),
                        kind,
                    });
                }
                if !seen.insert(name.as_str()) {
                    return Err(ModelError::ColumnInMultipleGroups {
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            categorical,
            continuous,
            labels,
        })
    }

    /// Build a schema from borrowed name lists, validating each name.
    pub fn from_names(
        categorical: &[&str],
        continuous: &[&str],
        labels: &[&str],
    ) -> Result<Self, ModelError> {
        let parse = |names: &[&str]| -> Result<Vec<ColumnName>, ModelError> {
            names.iter().map(|name| ColumnName::new(*name)).collect()
        };
        Self::new(parse(categorical)?, parse(continuous)?, parse(labels)?)
    }

    pub fn columns_of(&self, kind: VariableKind) -> &[ColumnName] {
        match kind {
            VariableKind::Categorical => &self.categorical,
            VariableKind::Continuous => &self.continuous,
            VariableKind::Label => &self.labels,
        }
    }

    /// All declared columns: categorical, then continuous, then labels.
    pub fn all_columns(&self) -> Vec<ColumnName> {
        self.categorical
            .iter()
            .chain(self.continuous.iter())
            .chain(self.labels.iter())
            .cloned()
            .collect()
    }

    pub fn kind_of(&self, name: &str) -> Option<VariableKind> {
        for (group, kind) in [
            (&self.categorical, VariableKind::Categorical),
            (&self.continuous, VariableKind::Continuous),
            (&self.labels, VariableKind::Label),
        ] {
            if group.iter().any(|c| c.as_str() == name) {
                return Some(kind);
            }
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    pub fn width(&self) -> usize {
        self.categorical.len() + self.continuous.len() + self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0
    }
}
