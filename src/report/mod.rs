//! Report rendering for stored datasets.
//!
//! Rendering is a pure function of a [`DatasetRecord`](crate::models::DatasetRecord):
//! the same record always yields the same bytes.

pub mod generator;

pub use generator::{render, render_json, render_markdown};

use crate::models::Summary;
use serde::{Deserialize, Serialize};

/// Output format of a rendered report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown document (default)
    #[default]
    Markdown,
    /// JSON document
    Json,
}

impl ReportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "text/markdown; charset=utf-8",
            ReportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }
}

/// Rendering knobs that do not affect the required sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Append a data preview table after the distribution.
    pub include_rows: bool,
    /// Maximum rows shown in the preview.
    pub max_preview_rows: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_rows: true,
            max_preview_rows: 50,
        }
    }
}

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content_type: &'static str,
    /// Suggested download name, e.g. `equipment_report_7.md`.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Round to `places` decimals, ties to even, on the exact binary value.
///
/// `2.675` is stored as `2.67499999...` and therefore rounds to `2.67`.
/// Negative zero collapses to zero.
pub fn round_half_even(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let rounded = format!("{:.*}", places as usize, value)
        .parse::<f64>()
        .unwrap_or(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Format with exactly two decimals after half-even rounding.
pub fn format_2dp(value: f64) -> String {
    format!("{:.2}", round_half_even(value, 2))
}

/// Copy of `summary` with averages rounded to two decimals, for API responses.
pub fn rounded_summary(summary: &Summary) -> Summary {
    Summary {
        total_count: summary.total_count,
        avg_flowrate: round_half_even(summary.avg_flowrate, 2),
        avg_pressure: round_half_even(summary.avg_pressure, 2),
        avg_temperature: round_half_even(summary.avg_temperature, 2),
        type_distribution: summary.type_distribution.clone(),
    }
}
