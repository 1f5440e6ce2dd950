//! Measurement aggregation and statistics.
//!
//! This module turns a validated table into typed rows and computes the
//! dataset summary: row count, per-column means and the Type distribution.
//! Parsing is strict: the first bad numeric cell fails the whole batch.

use crate::error::{EquipError, EquipResult};
use crate::ingest::ValidatedTable;
use crate::models::{Row, Summary, NUMERIC_COLUMNS};
use std::collections::BTreeMap;

/// Parse every row of `table` into a typed [`Row`].
///
/// Cells are scanned row by row, numeric columns in the order Flowrate,
/// Pressure, Temperature. The first cell that is not a finite number fails
/// with its zero-based data-row index and column name.
pub fn parse_rows(table: &ValidatedTable) -> EquipResult<Vec<Row>> {
    let mut rows = Vec::with_capacity(table.len());

    for (row_idx, record) in table.records().enumerate() {
        let mut values = [0.0f64; 3];
        for (slot, column) in values.iter_mut().zip(NUMERIC_COLUMNS) {
            let cell = record.required(column).unwrap_or_default();
            *slot = parse_numeric(cell).ok_or_else(|| EquipError::InvalidNumeric {
                row: row_idx,
                column: column.to_string(),
                value: cell.to_string(),
            })?;
        }
        let [flowrate, pressure, temperature] = values;

        rows.push(Row {
            equipment_name: record.equipment_name().to_string(),
            equipment_type: record.equipment_type().to_string(),
            flowrate,
            pressure,
            temperature,
            extra: record
                .extras()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        });
    }

    Ok(rows)
}

/// Parse one numeric cell. Surrounding whitespace is tolerated, non-finite values are not.
pub fn parse_numeric(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Compute the summary of already-parsed rows.
///
/// Fails with [`EquipError::EmptyDataset`] when there is nothing to average.
pub fn summarize_rows(rows: &[Row]) -> EquipResult<Summary> {
    if rows.is_empty() {
        return Err(EquipError::EmptyDataset);
    }

    Ok(Summary {
        total_count: rows.len(),
        avg_flowrate: column_mean(rows, |r| r.flowrate),
        avg_pressure: column_mean(rows, |r| r.pressure),
        avg_temperature: column_mean(rows, |r| r.temperature),
        type_distribution: type_distribution(rows),
    })
}

/// Validate-then-aggregate convenience: parse `table` and summarize it.
pub fn summarize(table: &ValidatedTable) -> EquipResult<Summary> {
    summarize_rows(&parse_rows(table)?)
}

/// Arithmetic mean of one column, clamped to the observed range.
///
/// `rows` must be non-empty. If the plain sum overflows, each value is
/// scaled by `1/n` before summing.
fn column_mean(rows: &[Row], value: impl Fn(&Row) -> f64) -> f64 {
    let n = rows.len() as f64;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for row in rows {
        let v = value(row);
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    let mut mean = sum / n;
    if !mean.is_finite() {
        mean = rows.iter().map(|r| value(r) / n).sum();
    }

    mean.clamp(min, max)
}

/// Count rows per exact Type value (case-sensitive, untrimmed).
pub fn type_distribution(rows: &[Row]) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = BTreeMap::new();

    for row in rows {
        *dist.entry(row.equipment_type.clone()).or_default() += 1;
    }

    dist
}

/// Distribution entries ordered by count (highest first), ties by name ascending.
pub fn sorted_distribution(dist: &BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> =
        dist.iter().map(|(name, count)| (name.clone(), *count)).collect();

    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    entries
}

/// Identify the most common equipment type, if any.
pub fn dominant_type(summary: &Summary) -> Option<(String, usize)> {
    sorted_distribution(&summary.type_distribution)
        .into_iter()
        .next()
}
