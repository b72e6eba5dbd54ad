use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use tabprep_common::format_numeric;
use tabprep_transform::ColumnStats;

use crate::commands::{FitOutcome, TransformOutcome};

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

pub fn print_fit_summary(outcome: &FitOutcome) {
    println!(
        "Fitted over {} rows in {} batches",
        outcome.stats.rows_seen(),
        outcome.stats.batches_seen()
    );
    println!("Statistics: {}", outcome.out.display());

    let mut table = Table::new();
    table.set_header(vec!["Op", "Column", "Statistic", "Fitted value"]);
    apply_table_style(&mut table);
    for (op, column, stats) in outcome.stats.entries() {
        for stat in stats {
            table.add_row(vec![
                Cell::new(op),
                Cell::new(column.as_str()),
                Cell::new(stat.kind().to_string()),
                Cell::new(preview(stat)),
            ]);
        }
    }
    println!("{table}");
}

pub fn print_transform_summary(outcome: &TransformOutcome) {
    println!("Output: {}", outcome.out.display());
    let mut table = Table::new();
    table.set_header(vec!["Rows", "Batches", "Columns"]);
    apply_table_style(&mut table);
    table.add_row(vec![
        Cell::new(outcome.rows).set_alignment(CellAlignment::Right),
        Cell::new(outcome.batches).set_alignment(CellAlignment::Right),
        Cell::new(outcome.output_columns.join(", ")),
    ]);
    println!("{table}");
}

/// One-line rendering of a fitted statistic.
fn preview(stat: &ColumnStats) -> String {
    match stat {
        ColumnStats::Moments(m) => format!(
            "n={}, mean={}, std={}",
            m.count,
            format_numeric(m.mean),
            format_numeric(m.std())
        ),
        ColumnStats::Range(r) => match (r.min, r.max) {
            (Some(min), Some(max)) => {
                format!("min={}, max={}", format_numeric(min), format_numeric(max))
            }
            _ => "unfitted".to_string(),
        },
        ColumnStats::CategoryEncoder(e) => format!("{} categories", e.num_categories()),
    }
}
