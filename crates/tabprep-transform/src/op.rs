//! Stateless operator descriptors.
//!
//! An [`OpSpec`] is plain data: a transform kind, a column selection, and an
//! output naming policy. It carries no fitted state, so the same spec can be
//! serialized, attached to different workflows, and replayed against any
//! dataset once a [`crate::StatsContext`] has been fitted for it. The actual
//! column arithmetic lives in [`crate::executors`].

use serde::{Deserialize, Serialize};

use tabprep_model::{ColumnName, ColumnSelector, ModelError, VariableKind};

use crate::stats::StatKind;

/// The transform a spec performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// Natural logarithm of continuous values; non-positive input becomes
    /// null.
    Log,
    /// Z-score scaling using fitted moments: `(x - mean) / std`.
    Normalize,
    /// Scale into `[0, 1]` using the fitted value range.
    MinMaxScale,
    /// Replace nulls with the fitted mean.
    FillMissing,
    /// Replace category values with stable integer codes.
    Categorify,
}

impl OpKind {
    pub const ALL: [Self; 5] = [
        Self::Log,
        Self::Normalize,
        Self::MinMaxScale,
        Self::FillMissing,
        Self::Categorify,
    ];

    /// Stable snake_case stem used for operator ids and appended column
    /// names.
    pub fn id_stem(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Normalize => "normalize",
            Self::MinMaxScale => "min_max_scale",
            Self::FillMissing => "fill_missing",
            Self::Categorify => "categorify",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Log => "Log",
            Self::Normalize => "Normalize",
            Self::MinMaxScale => "Min-Max Scale",
            Self::FillMissing => "Fill Missing",
            Self::Categorify => "Categorify",
        }
    }

    /// The variable kind a spec with a `Default` selector acts on.
    pub fn default_kind(self) -> VariableKind {
        match self {
            Self::Log | Self::Normalize | Self::MinMaxScale | Self::FillMissing => {
                VariableKind::Continuous
            }
            Self::Categorify => VariableKind::Categorical,
        }
    }

    /// Statistics that must be fitted before the operator can run.
    pub fn required_stats(self) -> &'static [StatKind] {
        match self {
            Self::Log => &[],
            Self::Normalize | Self::FillMissing => &[StatKind::Moments],
            Self::MinMaxScale => &[StatKind::Range],
            Self::Categorify => &[StatKind::CategoryEncoder],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Log => "natural log of positive values, null otherwise",
            Self::Normalize => "z-score using fitted mean and std",
            Self::MinMaxScale => "scale into [0, 1] using fitted min and max",
            Self::FillMissing => "replace nulls with the fitted mean",
            Self::Categorify => "encode categories as stable integer codes",
        }
    }
}

/// Where an operator writes its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Overwrite the selected columns in place.
    Replace,
    /// Keep the originals and append `<column>_<suffix>` outputs. With no
    /// suffix the operator's id stem is used.
    Append { suffix: Option<String> },
}

/// A stateless operator: kind, column selection, output naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpSpec {
    pub kind: OpKind,
    pub selector: ColumnSelector,
    pub output: OutputPolicy,
}

impl OpSpec {
    /// A spec acting on all columns of the kind's default group, in place.
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            selector: ColumnSelector::Default,
            output: OutputPolicy::Replace,
        }
    }

    pub fn with_columns(mut self, names: Vec<ColumnName>) -> Self {
        self.selector = ColumnSelector::Names(names);
        self
    }

    pub fn with_selector(mut self, selector: ColumnSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Keep originals and append outputs named `<column>_<id stem>`.
    pub fn appended(mut self) -> Self {
        self.output = OutputPolicy::Append { suffix: None };
        self
    }

    /// Keep originals and append outputs named `<column>_<suffix>`.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output = OutputPolicy::Append {
            suffix: Some(suffix.into()),
        };
        self
    }

    /// Resolve this spec's selection against the candidate columns.
    pub fn select_columns(
        &self,
        candidates: &[ColumnName],
    ) -> Result<Vec<ColumnName>, ModelError> {
        self.selector.resolve(candidates)
    }

    /// The name the transformed value for `column` is written under.
    pub fn output_name(&self, column: &ColumnName) -> ColumnName {
        match &self.output {
            OutputPolicy::Replace => column.clone(),
            OutputPolicy::Append { suffix } => {
                column.suffixed(suffix.as_deref().unwrap_or(self.kind.id_stem()))
            }
        }
    }

    /// The column set visible to the next operator, given this input set.
    ///
    /// Replace mode leaves names unchanged. Append mode keeps the input
    /// order and appends new names for every selected column, in input
    /// order.
    pub fn output_columns(&self, input: &[ColumnName]) -> Vec<ColumnName> {
        match &self.output {
            OutputPolicy::Replace => input.to_vec(),
            OutputPolicy::Append { .. } => {
                let mut out = input.to_vec();
                for column in input {
                    if self.selector.matches(column.as_str()) {
                        out.push(self.output_name(column));
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnName> {
        names.iter().map(|n| ColumnName::new(*n).unwrap()).collect()
    }

    #[test]
    fn replace_keeps_names() {
        let spec = OpSpec::new(OpKind::Log);
        let input = cols(&["a", "b"]);
        assert_eq!(spec.output_columns(&input), input);
        assert_eq!(spec.output_name(&input[0]).as_str(), "a");
    }

    #[test]
    fn append_uses_id_stem_by_default() {
        let spec = OpSpec::new(OpKind::Log).appended();
        let input = cols(&["a"]);
        assert_eq!(spec.output_name(&input[0]).as_str(), "a_log");
        assert_eq!(spec.output_columns(&input), cols(&["a", "a_log"]));
    }

    #[test]
    fn append_with_suffix_and_partial_selection() {
        let spec = OpSpec::new(OpKind::Normalize)
            .with_columns(cols(&["b"]))
            .with_suffix("scaled");
        let input = cols(&["a", "b"]);
        assert_eq!(spec.output_columns(&input), cols(&["a", "b", "b_scaled"]));
    }

    #[test]
    fn required_stats_per_kind() {
        assert!(OpKind::Log.required_stats().is_empty());
        assert_eq!(OpKind::Normalize.required_stats(), &[StatKind::Moments]);
        assert_eq!(
            OpKind::Categorify.required_stats(),
            &[StatKind::CategoryEncoder]
        );
    }
}
