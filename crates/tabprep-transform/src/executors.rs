//! Operator executor functions.
//!
//! Each function implements one [`crate::OpKind`] against DataFrame columns
//! and returns the number of rows it affected. Executors are intentionally
//! dumb: column resolution and statistics lookup policy live in
//! [`crate::workflow`] and [`crate::stats`].

use anyhow::{Context, Result};
use polars::prelude::{
    DataFrame, DataType, Float64Chunked, IntoColumn, StringChunked, UInt32Chunked,
};
use tracing::warn;

use tabprep_model::ColumnName;

use crate::error::TransformError;
use crate::op::OpKind;
use crate::stats::{CategoryEncoder, ColumnStats, Moments, Range, StatKind, StatsContext};
use crate::workflow::PlannedOp;

/// Apply one planned operator to a batch, resolving any fitted statistics it
/// needs from `stats`.
pub fn apply_op(
    df: &mut DataFrame,
    planned: &PlannedOp,
    stats: Option<&StatsContext>,
) -> Result<usize> {
    let mut affected = 0;
    for column in &planned.columns {
        let out = planned.spec.output_name(column);
        affected += match planned.spec.kind {
            OpKind::Log => apply_log(df, column, &out)?,
            OpKind::Normalize => {
                let moments = required_moments(stats, &planned.id, column)?;
                apply_normalize(df, column, &out, moments)?
            }
            OpKind::MinMaxScale => {
                let range = required_range(stats, &planned.id, column)?;
                apply_min_max_scale(df, column, &out, range)?
            }
            OpKind::FillMissing => {
                let moments = required_moments(stats, &planned.id, column)?;
                apply_fill_missing(df, column, &out, moments.mean)?
            }
            OpKind::Categorify => {
                let encoder = required_encoder(stats, &planned.id, column)?;
                apply_categorify(df, column, &out, encoder)?
            }
        };
    }
    Ok(affected)
}

/// Natural log; non-positive input becomes null.
///
/// Returns the number of rows that produced a value.
pub fn apply_log(df: &mut DataFrame, column: &ColumnName, out: &ColumnName) -> Result<usize> {
    let ca = float_column(df, column)?;
    let mut non_positive = 0usize;
    let logged: Float64Chunked = ca
        .into_iter()
        .map(|opt| match opt {
            Some(v) if v > 0.0 => Some(v.ln()),
            Some(_) => {
                non_positive += 1;
                None
            }
            None => None,
        })
        .collect();
    if non_positive > 0 {
        warn!(
            column = %column,
            count = non_positive,
            "log of non-positive values produced nulls"
        );
    }
    let logged = logged.with_name(out.as_str().into());
    let affected = logged.len() - logged.null_count();
    df.with_column(logged.into_column())?;
    Ok(affected)
}

/// Z-score scaling with fitted moments. A zero fitted std maps every value
/// to 0.0: a constant column carries no signal.
pub fn apply_normalize(
    df: &mut DataFrame,
    column: &ColumnName,
    out: &ColumnName,
    moments: &Moments,
) -> Result<usize> {
    let ca = float_column(df, column)?;
    let mean = moments.mean;
    let std = moments.std();
    let scaled: Float64Chunked = ca
        .into_iter()
        .map(|opt| {
            opt.map(|v| if std > 0.0 { (v - mean) / std } else { 0.0 })
        })
        .collect();
    let scaled = scaled.with_name(out.as_str().into());
    let affected = scaled.len() - scaled.null_count();
    df.with_column(scaled.into_column())?;
    Ok(affected)
}

/// Scale into `[0, 1]` with the fitted range. A degenerate range (all values
/// equal) maps to 0.0; an unfitted range produces nulls.
pub fn apply_min_max_scale(
    df: &mut DataFrame,
    column: &ColumnName,
    out: &ColumnName,
    range: &Range,
) -> Result<usize> {
    let ca = float_column(df, column)?;
    let scaled: Float64Chunked = match (range.min, range.span()) {
        (Some(min), Some(span)) => ca
            .into_iter()
            .map(|opt| opt.map(|v| if span > 0.0 { (v - min) / span } else { 0.0 }))
            .collect(),
        _ => {
            warn!(column = %column, "fitted range is empty, scaling to null");
            ca.into_iter().map(|_| None).collect()
        }
    };
    let scaled = scaled.with_name(out.as_str().into());
    let affected = scaled.len() - scaled.null_count();
    df.with_column(scaled.into_column())?;
    Ok(affected)
}

/// Replace nulls with the fitted mean.
///
/// Returns the number of nulls that were filled.
pub fn apply_fill_missing(
    df: &mut DataFrame,
    column: &ColumnName,
    out: &ColumnName,
    fill: f64,
) -> Result<usize> {
    let ca = float_column(df, column)?;
    let filled_count = ca.null_count();
    let filled: Float64Chunked = ca
        .into_iter()
        .map(|opt| Some(opt.unwrap_or(fill)))
        .collect();
    let filled = filled.with_name(out.as_str().into());
    df.with_column(filled.into_column())?;
    Ok(filled_count)
}

/// Encode categories as fitted integer codes; missing and unseen values
/// both encode as the reserved code 0.
pub fn apply_categorify(
    df: &mut DataFrame,
    column: &ColumnName,
    out: &ColumnName,
    encoder: &CategoryEncoder,
) -> Result<usize> {
    let ca = string_column(df, column)?;
    let code_map = encoder.code_map();
    let mut unseen = 0usize;
    let codes: UInt32Chunked = ca
        .into_iter()
        .map(|opt| {
            let trimmed = opt.map(str::trim).unwrap_or("");
            if trimmed.is_empty() {
                Some(0)
            } else {
                match code_map.get(trimmed) {
                    Some(code) => Some(*code),
                    None => {
                        unseen += 1;
                        Some(0)
                    }
                }
            }
        })
        .collect();
    if unseen > 0 {
        warn!(
            column = %column,
            count = unseen,
            "categories unseen during fitting encoded as 0"
        );
    }
    let height = codes.len();
    let codes = codes.with_name(out.as_str().into());
    df.with_column(codes.into_column())?;
    Ok(height)
}

pub(crate) fn float_column(df: &DataFrame, column: &ColumnName) -> Result<Float64Chunked> {
    let col = df
        .column(column.as_str())
        .with_context(|| format!("column {column} not present in batch"))?;
    let casted = col
        .cast(&DataType::Float64)
        .with_context(|| format!("column {column} cannot be read as numeric"))?;
    Ok(casted.f64()?.clone())
}

pub(crate) fn string_column(df: &DataFrame, column: &ColumnName) -> Result<StringChunked> {
    let col = df
        .column(column.as_str())
        .with_context(|| format!("column {column} not present in batch"))?;
    let casted = col
        .cast(&DataType::String)
        .with_context(|| format!("column {column} cannot be read as text"))?;
    Ok(casted.str()?.clone())
}

fn required_stat<'a>(
    stats: Option<&'a StatsContext>,
    op_id: &str,
    column: &ColumnName,
    kind: StatKind,
) -> Result<&'a ColumnStats> {
    let ctx = stats.ok_or_else(|| TransformError::MissingStats {
        op: op_id.to_string(),
        stat: kind,
    })?;
    if ctx.op_state(op_id).is_none() {
        return Err(TransformError::UnfittedOp {
            op: op_id.to_string(),
        }
        .into());
    }
    ctx.stat(op_id, column, kind).ok_or_else(|| {
        TransformError::MissingColumnStats {
            op: op_id.to_string(),
            column: column.to_string(),
            stat: kind,
        }
        .into()
    })
}

fn required_moments<'a>(
    stats: Option<&'a StatsContext>,
    op_id: &str,
    column: &ColumnName,
) -> Result<&'a Moments> {
    let stat = required_stat(stats, op_id, column, StatKind::Moments)?;
    stat.as_moments().ok_or_else(|| {
        TransformError::MissingColumnStats {
            op: op_id.to_string(),
            column: column.to_string(),
            stat: StatKind::Moments,
        }
        .into()
    })
}

fn required_range<'a>(
    stats: Option<&'a StatsContext>,
    op_id: &str,
    column: &ColumnName,
) -> Result<&'a Range> {
    let stat = required_stat(stats, op_id, column, StatKind::Range)?;
    stat.as_range().ok_or_else(|| {
        TransformError::MissingColumnStats {
            op: op_id.to_string(),
            column: column.to_string(),
            stat: StatKind::Range,
        }
        .into()
    })
}

fn required_encoder<'a>(
    stats: Option<&'a StatsContext>,
    op_id: &str,
    column: &ColumnName,
) -> Result<&'a CategoryEncoder> {
    let stat = required_stat(stats, op_id, column, StatKind::CategoryEncoder)?;
    stat.as_encoder().ok_or_else(|| {
        TransformError::MissingColumnStats {
            op: op_id.to_string(),
            column: column.to_string(),
            stat: StatKind::CategoryEncoder,
        }
        .into()
    })
}
