//! Markdown and JSON report generation.
//!
//! Layout is fixed: title block, summary block, Type distribution table, then
//! an optional data preview and the footer. The distribution is sorted here
//! (count descending, then name) rather than relying on map order.

use crate::analysis::sorted_distribution;
use crate::models::{DatasetRecord, Row, Summary};
use crate::report::{format_2dp, round_half_even, Document, ReportFormat, ReportOptions};
use serde_json::json;

/// Render `record` in the requested format.
pub fn render(record: &DatasetRecord, format: ReportFormat, options: &ReportOptions) -> Document {
    let bytes = match format {
        ReportFormat::Markdown => render_markdown(record, options).into_bytes(),
        ReportFormat::Json => render_json(record, options).into_bytes(),
    };

    Document {
        content_type: format.content_type(),
        filename: format!("equipment_report_{}.{}", record.id, format.extension()),
        bytes,
    }
}

/// Generate a complete Markdown report.
pub fn render_markdown(record: &DatasetRecord, options: &ReportOptions) -> String {
    let mut output = String::new();

    output.push_str(&generate_title_block(record));
    output.push_str(&generate_summary_section(&record.summary));
    output.push_str(&generate_distribution_section(&record.summary));

    if options.include_rows {
        output.push_str(&generate_preview_section(&record.rows, options.max_preview_rows));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the title block.
fn generate_title_block(record: &DatasetRecord) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "# Equipment Report - {}\n\n",
        escape_inline(&record.filename)
    ));
    section.push_str(&format!("- **Dataset ID:** {}\n", record.id));
    section.push_str(&format!("- **Owner:** {}\n", escape_inline(record.owner_id.as_str())));
    section.push_str(&format!(
        "- **Uploaded:** {}\n",
        record.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

/// Generate the summary statistics block.
fn generate_summary_section(summary: &Summary) -> String {
    let mut section = String::new();

    section.push_str("## Summary Statistics\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!("| Total Equipment | {} |\n", summary.total_count));
    section.push_str(&format!(
        "| Average Flowrate | {} |\n",
        format_2dp(summary.avg_flowrate)
    ));
    section.push_str(&format!(
        "| Average Pressure | {} |\n",
        format_2dp(summary.avg_pressure)
    ));
    section.push_str(&format!(
        "| Average Temperature | {} |\n",
        format_2dp(summary.avg_temperature)
    ));
    section.push('\n');

    section
}

/// Generate the Type distribution table.
fn generate_distribution_section(summary: &Summary) -> String {
    let mut section = String::new();

    section.push_str("## Type Distribution\n\n");
    section.push_str("| Equipment Type | Count |\n");
    section.push_str("|:---|:---:|\n");

    for (equipment_type, count) in sorted_distribution(&summary.type_distribution) {
        section.push_str(&format!("| {} | {} |\n", escape_cell(&equipment_type), count));
    }
    section.push('\n');

    section
}

/// Generate the data preview table.
fn generate_preview_section(rows: &[Row], max_rows: usize) -> String {
    let mut section = String::new();

    section.push_str("## Data Preview\n\n");
    section.push_str("| Equipment Name | Type | Flowrate | Pressure | Temperature |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");

    for row in rows.iter().take(max_rows) {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            escape_cell(&row.equipment_name),
            escape_cell(&row.equipment_type),
            row.flowrate,
            row.pressure,
            row.temperature
        ));
    }

    if rows.len() > max_rows {
        section.push_str(&format!(
            "\n*Showing {} of {} rows*\n",
            max_rows,
            rows.len()
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by equipstat*\n");

    footer
}

/// Escape text placed inside a Markdown table cell.
fn escape_cell(text: &str) -> String {
    escape_inline(text).replace('|', "\\|")
}

/// Flatten line breaks so user text cannot start a new Markdown block.
fn escape_inline(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Generate a JSON report.
///
/// Averages are rounded the same way as the Markdown summary, and the
/// distribution is an ordered array so consumers see the report ordering.
pub fn render_json(record: &DatasetRecord, options: &ReportOptions) -> String {
    let distribution: Vec<_> = sorted_distribution(&record.summary.type_distribution)
        .into_iter()
        .map(|(equipment_type, count)| json!({ "type": equipment_type, "count": count }))
        .collect();

    let mut report = json!({
        "title": format!("Equipment Report - {}", record.filename),
        "dataset_id": record.id,
        "owner": record.owner_id,
        "filename": record.filename,
        "uploaded_at": record.uploaded_at,
        "summary": {
            "total_count": record.summary.total_count,
            "avg_flowrate": round_half_even(record.summary.avg_flowrate, 2),
            "avg_pressure": round_half_even(record.summary.avg_pressure, 2),
            "avg_temperature": round_half_even(record.summary.avg_temperature, 2),
        },
        "type_distribution": distribution,
    });

    if options.include_rows {
        let preview: Vec<&Row> = record.rows.iter().take(options.max_preview_rows).collect();
        report["rows"] = json!(preview);
        report["rows_total"] = json!(record.rows.len());
    }

    format!("{:#}", report)
}
