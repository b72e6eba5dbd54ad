//! Fitted statistics and the fitting pass.
//!
//! Statistics accumulate batch-by-batch so a dataset never has to fit in a
//! single frame. [`Moments`] merges per-batch count/mean/variance with the
//! pairwise update rule; [`CategoryEncoder`] accumulates the set of observed
//! category values, so its final encoding does not depend on batch order.
//!
//! [`StatsContext`] keys fitted state by operator id and column, which keeps
//! one fitted snapshot reusable against any batch stream with the same
//! schema.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use polars::prelude::{DataFrame, Float64Chunked, StringChunked};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tabprep_model::ColumnName;

use crate::error::StatsError;
use crate::executors;
use crate::workflow::Workflow;

/// Kinds of fitted statistics an operator can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Moments,
    Range,
    CategoryEncoder,
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Moments => "moments",
            Self::Range => "range",
            Self::CategoryEncoder => "category_encoder",
        };
        f.write_str(name)
    }
}

/// Streaming count, mean, and population variance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub count: u64,
    pub mean: f64,
    pub var: f64,
}

impl Moments {
    /// Merge another set of moments into this one.
    ///
    /// `new_var` folds both variances plus the between-part correction
    /// `(n_a·n_b/n²)·(mean_a - mean_b)²`, so merging is exact regardless of
    /// how the rows were split.
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let mean = other.mean * (n_b / n) + self.mean * (n_a / n);
        let var = other.var * (n_b / n)
            + self.var * (n_a / n)
            + (n_a * n_b / (n * n)) * (self.mean - other.mean).powi(2);
        self.count += other.count;
        self.mean = mean;
        self.var = var;
    }

    /// Fold one batch of values into the running moments.
    pub fn observe_slice(&mut self, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        self.merge(&Self {
            count: values.len() as u64,
            mean,
            var,
        });
    }

    /// Fold the non-null values of a column into the running moments.
    pub fn observe(&mut self, column: &Float64Chunked) {
        let values: Vec<f64> = column.into_iter().flatten().collect();
        self.observe_slice(&values);
    }

    pub fn std(&self) -> f64 {
        self.var.max(0.0).sqrt()
    }
}

/// Streaming minimum and maximum over non-null values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    pub fn observe(&mut self, column: &Float64Chunked) {
        for value in column.into_iter().flatten() {
            self.min = Some(self.min.map_or(value, |m| m.min(value)));
            self.max = Some(self.max.map_or(value, |m| m.max(value)));
        }
    }

    /// `max - min`, or `None` before any value has been observed.
    pub fn span(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

/// Accumulates distinct category values and assigns stable integer codes.
///
/// Codes are 1-based ranks in lexicographic order over everything observed;
/// 0 is reserved for values the fitting pass never saw. Because the
/// underlying store is a set, fitting the same rows in a different batch
/// order produces the same encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    categories: BTreeSet<String>,
}

impl CategoryEncoder {
    /// Record one category value. Empty (or whitespace-only) values are
    /// treated as missing and not recorded.
    pub fn observe(&mut self, value: &str) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.categories.insert(trimmed.to_string());
        }
    }

    pub fn observe_column(&mut self, column: &StringChunked) {
        for value in column.into_iter().flatten() {
            self.observe(value);
        }
    }

    pub fn num_categories(&self) -> usize {
        self.categories.len()
    }

    /// The fitted code for a value, if it was observed.
    pub fn code(&self, value: &str) -> Option<u32> {
        self.categories
            .iter()
            .position(|c| c == value.trim())
            .map(|rank| (rank + 1) as u32)
    }

    /// Value-to-code lookup for one batch worth of encoding.
    pub fn code_map(&self) -> BTreeMap<&str, u32> {
        self.categories
            .iter()
            .enumerate()
            .map(|(rank, value)| (value.as_str(), (rank + 1) as u32))
            .collect()
    }
}

/// Fitted statistics for one column of one operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stat", rename_all = "snake_case")]
pub enum ColumnStats {
    Moments(Moments),
    Range(Range),
    CategoryEncoder(CategoryEncoder),
}

impl ColumnStats {
    pub fn empty(kind: StatKind) -> Self {
        match kind {
            StatKind::Moments => Self::Moments(Moments::default()),
            StatKind::Range => Self::Range(Range::default()),
            StatKind::CategoryEncoder => Self::CategoryEncoder(CategoryEncoder::default()),
        }
    }

    pub fn kind(&self) -> StatKind {
        match self {
            Self::Moments(_) => StatKind::Moments,
            Self::Range(_) => StatKind::Range,
            Self::CategoryEncoder(_) => StatKind::CategoryEncoder,
        }
    }

    pub fn as_moments(&self) -> Option<&Moments> {
        match self {
            Self::Moments(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&Range> {
        match self {
            Self::Range(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_encoder(&self) -> Option<&CategoryEncoder> {
        match self {
            Self::CategoryEncoder(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-operator, per-column fitted state for one workflow.
///
/// State is keyed by the workflow's positional operator ids, so a context
/// fitted for one workflow refuses to serve another whose operators do not
/// line up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsContext {
    state: BTreeMap<String, BTreeMap<ColumnName, Vec<ColumnStats>>>,
    rows_seen: u64,
    batches_seen: u64,
}

impl StatsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn op_state(&self, op_id: &str) -> Option<&BTreeMap<ColumnName, Vec<ColumnStats>>> {
        self.state.get(op_id)
    }

    pub fn column_stats(&self, op_id: &str, column: &ColumnName) -> Option<&[ColumnStats]> {
        self.state
            .get(op_id)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
    }

    pub fn stat(&self, op_id: &str, column: &ColumnName, kind: StatKind) -> Option<&ColumnStats> {
        self.column_stats(op_id, column)?
            .iter()
            .find(|s| s.kind() == kind)
    }

    /// Iterate all fitted entries as `(op id, column, stats)`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ColumnName, &[ColumnStats])> {
        self.state.iter().flat_map(|(op, columns)| {
            columns
                .iter()
                .map(move |(column, stats)| (op.as_str(), column, stats.as_slice()))
        })
    }

    /// Check that this context covers every statistic `workflow` needs.
    pub fn validate_for(&self, workflow: &Workflow) -> anyhow::Result<()> {
        for (op_id, column, kind) in workflow.required_stats()? {
            if self.stat(&op_id, &column, kind).is_none() {
                return Err(StatsError::WarmStartIncomplete {
                    op: op_id,
                    column: column.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Fit this context over a stream of raw batches in a single pass.
    ///
    /// Operators that need no statistics are applied to the in-memory batch
    /// as it flows by, so downstream statistics observe upstream transforms:
    /// a `Log → Normalize` chain fits its moments over logged values.
    /// Operators that do need statistics update their state and then consume
    /// their input columns for the remainder of the pass, since they cannot
    /// be applied until their own statistics exist. A later operator that
    /// selects a consumed column is an error.
    ///
    /// With `warm_start`, existing state keeps accumulating; the context
    /// must already cover the workflow's operators and columns.
    pub fn fit<I>(&mut self, workflow: &Workflow, batches: I, warm_start: bool) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = DataFrame>,
    {
        let plan = workflow.plan()?;

        if warm_start {
            for planned in &plan {
                if planned.spec.kind.required_stats().is_empty() {
                    continue;
                }
                for column in &planned.columns {
                    if self
                        .column_stats(&planned.id, column)
                        .is_none_or(<[ColumnStats]>::is_empty)
                    {
                        return Err(StatsError::WarmStartIncomplete {
                            op: planned.id.clone(),
                            column: column.to_string(),
                        }
                        .into());
                    }
                }
            }
        } else {
            self.state.clear();
            self.rows_seen = 0;
            self.batches_seen = 0;
            for planned in &plan {
                let required = planned.spec.kind.required_stats();
                if required.is_empty() {
                    continue;
                }
                let columns = self.state.entry(planned.id.clone()).or_default();
                for column in &planned.columns {
                    columns.insert(
                        column.clone(),
                        required.iter().map(|kind| ColumnStats::empty(*kind)).collect(),
                    );
                }
            }
        }

        let mut batches_this_pass = 0u64;
        for mut df in batches {
            batches_this_pass += 1;
            self.rows_seen += df.height() as u64;
            let mut consumed: BTreeSet<ColumnName> = BTreeSet::new();

            for planned in &plan {
                if let Some(column) = planned.columns.iter().find(|c| consumed.contains(*c)) {
                    return Err(StatsError::ColumnConsumed {
                        op: planned.id.clone(),
                        column: column.to_string(),
                    }
                    .into());
                }

                if planned.spec.kind.required_stats().is_empty() {
                    executors::apply_op(&mut df, planned, None)?;
                    continue;
                }

                for column in &planned.columns {
                    let stats = self
                        .state
                        .get_mut(&planned.id)
                        .and_then(|columns| columns.get_mut(column))
                        .ok_or_else(|| StatsError::WarmStartIncomplete {
                            op: planned.id.clone(),
                            column: column.to_string(),
                        })?;
                    for stat in stats.iter_mut() {
                        match stat {
                            ColumnStats::Moments(m) => {
                                m.observe(&executors::float_column(&df, column)?);
                            }
                            ColumnStats::Range(r) => {
                                r.observe(&executors::float_column(&df, column)?);
                            }
                            ColumnStats::CategoryEncoder(e) => {
                                e.observe_column(&executors::string_column(&df, column)?);
                            }
                        }
                    }
                }
                // Neither the inputs nor the (not yet computable) outputs of
                // a stat-requiring op exist for the rest of the pass.
                for column in &planned.columns {
                    consumed.insert(column.clone());
                    consumed.insert(planned.spec.output_name(column));
                }
                df = df.drop_many(planned.columns.iter().map(ColumnName::as_str));
                debug!(op = %planned.id, columns = planned.columns.len(), "updated statistics");
            }
        }

        if batches_this_pass == 0 {
            return Err(StatsError::EmptyDataset.into());
        }
        self.batches_seen += batches_this_pass;
        info!(
            rows = self.rows_seen,
            batches = self.batches_seen,
            operators = self.state.len(),
            "fitted statistics"
        );
        Ok(())
    }
}
