//! Phases and workflows.
//!
//! A [`Phase`] is a named, ordered composition of operators acting on one
//! variable kind. Phases are validated when attached, not when built, so a
//! phase can be reused across workflows with different schemas; it is
//! constrained only to the extent its operators are constrained.
//!
//! A [`Workflow`] is a schema plus an ordered list of phases. It is plain,
//! serializable data; applying it to a batch walks every phase's operators
//! in order, resolving fitted statistics by positional operator id.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tabprep_model::{ColumnName, Schema, VariableKind};

use crate::error::TransformError;
use crate::executors;
use crate::op::OpSpec;
use crate::stats::{StatKind, StatsContext};

/// The variable kind a phase operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Categorical,
    Continuous,
}

impl PhaseKind {
    pub fn variable_kind(self) -> VariableKind {
        match self {
            Self::Categorical => VariableKind::Categorical,
            Self::Continuous => VariableKind::Continuous,
        }
    }
}

/// A named composition of operators over one variable kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub name: String,
    pub ops: Vec<OpSpec>,
}

impl Phase {
    pub fn new(kind: PhaseKind, name: impl Into<String>, ops: Vec<OpSpec>) -> Self {
        Self {
            kind,
            name: name.into(),
            ops,
        }
    }

    /// Validate every operator against the evolving column set.
    pub fn validate(&self, columns: &[ColumnName]) -> Result<(), TransformError> {
        let mut columns = columns.to_vec();
        for op in &self.ops {
            if op.kind.default_kind() != self.kind.variable_kind() {
                return Err(TransformError::PhaseKindMismatch {
                    phase: self.name.clone(),
                    phase_kind: self.kind.variable_kind().to_string(),
                    op: op.kind.id_stem().to_string(),
                    op_kind: op.kind.default_kind().to_string(),
                });
            }
            op.select_columns(&columns)
                .map_err(|source| TransformError::InvalidSelection {
                    op: op.kind.id_stem().to_string(),
                    phase: self.name.clone(),
                    source,
                })?;
            columns = op.output_columns(&columns);
        }
        Ok(())
    }

    /// The column set after all operators have run.
    pub fn output_columns(&self, columns: &[ColumnName]) -> Vec<ColumnName> {
        let mut columns = columns.to_vec();
        for op in &self.ops {
            columns = op.output_columns(&columns);
        }
        columns
    }
}

/// One operator at its position in a workflow, with its selection resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOp {
    /// Positional operator id (`log`, `log_2`, ...), the key into fitted
    /// statistics.
    pub id: String,
    /// Name of the phase the operator belongs to.
    pub phase: String,
    pub spec: OpSpec,
    /// Columns the operator acts on, resolved against the schema evolution.
    pub columns: Vec<ColumnName>,
}

/// An ordered operator pipeline bound to a declared schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    schema: Schema,
    phases: Vec<Phase>,
}

impl Workflow {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            phases: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Attach a phase, validating it against the columns visible at its
    /// position. Returns the extended workflow; the original phases are
    /// never mutated.
    pub fn with_phase(mut self, phase: Phase) -> Result<Self, TransformError> {
        let columns = self.columns_at(phase.kind, None);
        phase.validate(&columns)?;
        self.phases.push(phase);
        Ok(self)
    }

    /// Evolved column names of `kind`, stopping after the named phase (or
    /// after all phases when `up_to` is `None`).
    pub fn columns_at(&self, kind: PhaseKind, up_to: Option<&str>) -> Vec<ColumnName> {
        let mut columns = self.schema.columns_of(kind.variable_kind()).to_vec();
        for phase in &self.phases {
            if phase.kind == kind {
                columns = phase.output_columns(&columns);
            }
            if up_to.is_some_and(|name| name == phase.name) {
                break;
            }
        }
        columns
    }

    pub fn categorical_columns(&self) -> Vec<ColumnName> {
        self.columns_at(PhaseKind::Categorical, None)
    }

    pub fn continuous_columns(&self) -> Vec<ColumnName> {
        self.columns_at(PhaseKind::Continuous, None)
    }

    /// All output columns: categorical, then continuous, then labels.
    pub fn columns(&self) -> Vec<ColumnName> {
        let mut columns = self.categorical_columns();
        columns.extend(self.continuous_columns());
        columns.extend(self.schema.columns_of(VariableKind::Label).iter().cloned());
        columns
    }

    /// Positional operator ids, in execution order.
    ///
    /// The first operator of a kind gets the bare stem; later ones get a
    /// positional suffix, so two `Log` ops in one workflow keep separate
    /// fitted state.
    pub fn op_ids(&self) -> Vec<String> {
        let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
        let mut ids = Vec::new();
        for phase in &self.phases {
            for op in &phase.ops {
                let stem = op.kind.id_stem();
                let n = counts.entry(stem).or_insert(0);
                *n += 1;
                if *n == 1 {
                    ids.push(stem.to_string());
                } else {
                    ids.push(format!("{stem}_{n}"));
                }
            }
        }
        ids
    }

    /// Resolve every operator's columns against the schema evolution.
    pub fn plan(&self) -> Result<Vec<PlannedOp>, TransformError> {
        let mut categorical = self.schema.columns_of(VariableKind::Categorical).to_vec();
        let mut continuous = self.schema.columns_of(VariableKind::Continuous).to_vec();
        let mut ids = self.op_ids().into_iter();
        let mut plan = Vec::new();

        for phase in &self.phases {
            for op in &phase.ops {
                let id = ids.next().unwrap_or_else(|| op.kind.id_stem().to_string());
                if op.kind.default_kind() != phase.kind.variable_kind() {
                    return Err(TransformError::PhaseKindMismatch {
                        phase: phase.name.clone(),
                        phase_kind: phase.kind.variable_kind().to_string(),
                        op: op.kind.id_stem().to_string(),
                        op_kind: op.kind.default_kind().to_string(),
                    });
                }
                let candidates = match phase.kind {
                    PhaseKind::Categorical => &mut categorical,
                    PhaseKind::Continuous => &mut continuous,
                };
                let columns = op.select_columns(candidates).map_err(|source| {
                    TransformError::InvalidSelection {
                        op: id.clone(),
                        phase: phase.name.clone(),
                        source,
                    }
                })?;
                *candidates = op.output_columns(candidates);
                plan.push(PlannedOp {
                    id,
                    phase: phase.name.clone(),
                    spec: op.clone(),
                    columns,
                });
            }
        }
        Ok(plan)
    }

    /// The `(op id, column, stat)` triples a fitting pass must populate.
    pub fn required_stats(
        &self,
    ) -> Result<Vec<(String, ColumnName, StatKind)>, TransformError> {
        let mut required = Vec::new();
        for planned in self.plan()? {
            for kind in planned.spec.kind.required_stats() {
                for column in &planned.columns {
                    required.push((planned.id.clone(), column.clone(), *kind));
                }
            }
        }
        Ok(required)
    }

    /// Apply every phase's operators to one batch, in order.
    ///
    /// Operators that require statistics resolve them from `stats` by
    /// positional id; a missing or incomplete context is an error. Label
    /// columns are never touched.
    pub fn apply(&self, df: &mut DataFrame, stats: Option<&StatsContext>) -> anyhow::Result<()> {
        for planned in self.plan()? {
            let affected = executors::apply_op(df, &planned, stats)?;
            debug!(
                op = %planned.id,
                phase = %planned.phase,
                columns = planned.columns.len(),
                rows = affected,
                "applied operator"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use polars::df;
    use polars::prelude::DataType;

    use tabprep_model::ColumnSelector;

    use super::*;
    use crate::error::StatsError;
    use crate::op::{OpKind, OpSpec};
    use crate::stats::ColumnStats;

    fn cols(names: &[&str]) -> Vec<ColumnName> {
        names.iter().map(|n| ColumnName::new(*n).unwrap()).collect()
    }

    fn demo_schema() -> Schema {
        Schema::from_names(
            &["uid", "location"],
            &["timestamp", "user_age"],
            &["click"],
        )
        .unwrap()
    }

    #[test]
    fn attaching_a_phase_validates_selection() {
        let workflow = Workflow::new(demo_schema());
        let phase = Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Log).with_columns(cols(&["missing"]))],
        );
        let err = workflow.with_phase(phase).unwrap_err();
        assert!(matches!(err, TransformError::InvalidSelection { .. }));
    }

    #[test]
    fn attaching_rejects_mismatched_op_kind() {
        let workflow = Workflow::new(demo_schema());
        let phase = Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Categorify)],
        );
        let err = workflow.with_phase(phase).unwrap_err();
        assert!(matches!(err, TransformError::PhaseKindMismatch { .. }));
    }

    #[test]
    fn columns_evolve_through_append_ops() {
        let workflow = Workflow::new(demo_schema())
            .with_phase(Phase::new(
                PhaseKind::Continuous,
                "expand",
                vec![OpSpec::new(OpKind::Log).appended()],
            ))
            .unwrap();
        assert_eq!(
            workflow.continuous_columns(),
            cols(&["timestamp", "user_age", "timestamp_log", "user_age_log"])
        );
        let all = workflow.columns();
        assert_eq!(all.first().unwrap().as_str(), "uid");
        assert_eq!(all.last().unwrap().as_str(), "click");
    }

    #[test]
    fn op_ids_disambiguate_duplicates() {
        let workflow = Workflow::new(demo_schema())
            .with_phase(Phase::new(
                PhaseKind::Continuous,
                "first",
                vec![OpSpec::new(OpKind::Log), OpSpec::new(OpKind::Normalize)],
            ))
            .unwrap()
            .with_phase(Phase::new(
                PhaseKind::Continuous,
                "second",
                vec![OpSpec::new(OpKind::Log).appended()],
            ))
            .unwrap();
        assert_eq!(workflow.op_ids(), vec!["log", "normalize", "log_2"]);
    }

    #[test]
    fn columns_at_stops_after_named_phase() {
        let workflow = Workflow::new(demo_schema())
            .with_phase(Phase::new(
                PhaseKind::Continuous,
                "expand",
                vec![OpSpec::new(OpKind::Log).appended()],
            ))
            .unwrap()
            .with_phase(Phase::new(
                PhaseKind::Continuous,
                "more",
                vec![OpSpec::new(OpKind::Log).with_suffix("again")],
            ))
            .unwrap();
        let after_first = workflow.columns_at(PhaseKind::Continuous, Some("expand"));
        assert_eq!(
            after_first,
            cols(&["timestamp", "user_age", "timestamp_log", "user_age_log"])
        );
    }

    #[test]
    fn fit_then_apply_round_trip() {
        let workflow = Workflow::new(
            Schema::from_names(&["location"], &["amount"], &["click"]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Log), OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap()
        .with_phase(Phase::new(
            PhaseKind::Categorical,
            "encode",
            vec![OpSpec::new(OpKind::Categorify)],
        ))
        .unwrap();

        let raw = df!(
            "location" => ["tokyo", "lima", "tokyo", "lima"],
            "amount" => [1.0f64, 1.0, 1.0, 1.0],
            "click" => [0i64, 1, 0, 1]
        )
        .unwrap();

        let mut stats = StatsContext::new();
        stats
            .fit(&workflow, vec![raw.clone()], false)
            .unwrap();
        assert_eq!(stats.rows_seen(), 4);

        // moments were fitted over logged values: ln(1) == 0
        let moments = stats
            .stat(
                "normalize",
                &ColumnName::new("amount").unwrap(),
                StatKind::Moments,
            )
            .and_then(ColumnStats::as_moments)
            .unwrap();
        assert_eq!(moments.count, 4);
        assert!(moments.mean.abs() < 1e-12);

        let mut batch = raw;
        workflow.apply(&mut batch, Some(&stats)).unwrap();

        // constant column: log -> 0, normalize with std 0 -> 0.0
        let amount = batch.column("amount").unwrap().f64().unwrap();
        assert!(amount.into_iter().all(|v| v == Some(0.0)));

        // lima -> 1, tokyo -> 2 in lexicographic order
        let location = batch.column("location").unwrap();
        assert_eq!(location.dtype(), &DataType::UInt32);
        let codes: Vec<Option<u32>> = location.u32().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some(2), Some(1), Some(2), Some(1)]);

        // labels pass through untouched
        let click: Vec<Option<i64>> =
            batch.column("click").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(click, vec![Some(0), Some(1), Some(0), Some(1)]);
    }

    #[test]
    fn apply_without_stats_is_a_typed_error() {
        let workflow = Workflow::new(
            Schema::from_names(&[], &["amount"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap();

        let mut batch = df!("amount" => [1.0f64, 2.0]).unwrap();
        let err = workflow.apply(&mut batch, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransformError>(),
            Some(TransformError::MissingStats { .. })
        ));
    }

    #[test]
    fn fit_rejects_ops_behind_consumed_columns() {
        // Two stat-requiring ops on the same column: the first consumes it
        // during fitting, so the second cannot observe transformed values.
        let workflow = Workflow::new(
            Schema::from_names(&[], &["amount"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "first",
            vec![OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap()
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "second",
            vec![OpSpec::new(OpKind::MinMaxScale)],
        ))
        .unwrap();

        let batch = df!("amount" => [1.0f64, 2.0]).unwrap();
        let mut stats = StatsContext::new();
        let err = stats.fit(&workflow, vec![batch], false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StatsError>(),
            Some(StatsError::ColumnConsumed { .. })
        ));
    }

    #[test]
    fn fit_over_no_batches_is_an_error() {
        let workflow = Workflow::new(
            Schema::from_names(&[], &["amount"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap();
        let mut stats = StatsContext::new();
        let err = stats
            .fit(&workflow, Vec::<DataFrame>::new(), false)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StatsError>(),
            Some(StatsError::EmptyDataset)
        ));
    }

    #[test]
    fn warm_start_keeps_accumulating() {
        let workflow = Workflow::new(
            Schema::from_names(&[], &["amount"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap();

        let first = df!("amount" => [1.0f64, 2.0]).unwrap();
        let second = df!("amount" => [3.0f64, 4.0]).unwrap();

        let mut warm = StatsContext::new();
        warm.fit(&workflow, vec![first.clone()], false).unwrap();
        warm.fit(&workflow, vec![second.clone()], true).unwrap();

        let mut single = StatsContext::new();
        single.fit(&workflow, vec![first, second], false).unwrap();

        let column = ColumnName::new("amount").unwrap();
        let warm_moments = warm
            .stat("normalize", &column, StatKind::Moments)
            .and_then(ColumnStats::as_moments)
            .unwrap();
        let single_moments = single
            .stat("normalize", &column, StatKind::Moments)
            .and_then(ColumnStats::as_moments)
            .unwrap();
        assert_eq!(warm_moments.count, 4);
        assert!((warm_moments.mean - single_moments.mean).abs() < 1e-12);
        assert!((warm_moments.var - single_moments.var).abs() < 1e-12);
    }

    #[test]
    fn warm_start_without_state_is_an_error() {
        let workflow = Workflow::new(
            Schema::from_names(&[], &["amount"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap();
        let batch = df!("amount" => [1.0f64]).unwrap();
        let mut stats = StatsContext::new();
        let err = stats.fit(&workflow, vec![batch], true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StatsError>(),
            Some(StatsError::WarmStartIncomplete { .. })
        ));
    }

    #[test]
    fn selector_variants_resolve_in_plan() {
        let workflow = Workflow::new(
            Schema::from_names(&[], &["user_age", "item_age", "rating"], &[]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "ages",
            vec![OpSpec::new(OpKind::Log)
                .with_selector(ColumnSelector::Suffix("_age".to_string()))],
        ))
        .unwrap();
        let plan = workflow.plan().unwrap();
        assert_eq!(plan[0].columns, cols(&["user_age", "item_age"]));
    }

    #[test]
    fn workflow_serialization_is_stable() {
        let workflow = Workflow::new(
            Schema::from_names(&["uid"], &["age"], &["click"]).unwrap(),
        )
        .with_phase(Phase::new(
            PhaseKind::Continuous,
            "scale",
            vec![OpSpec::new(OpKind::Log), OpSpec::new(OpKind::Normalize)],
        ))
        .unwrap();
        insta::assert_snapshot!(
            serde_json::to_string(&workflow).unwrap(),
            @r#"{"schema":{"categorical":["uid"],"continuous":["age"],"labels":["click"]},"phases":[{"kind":"continuous","name":"scale","ops":[{"kind":"log","selector":"default","output":"replace"},{"kind":"normalize","selector":"default","output":"replace"}]}]}"#
        );
    }

    #[test]
    fn workflow_round_trips_through_json() {
        let workflow = Workflow::new(demo_schema())
            .with_phase(Phase::new(
                PhaseKind::Continuous,
                "scale",
                vec![OpSpec::new(OpKind::Normalize).with_suffix("z")],
            ))
            .unwrap();
        let json = serde_json::to_string(&workflow).unwrap();
        let restored: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, workflow);
    }
}
