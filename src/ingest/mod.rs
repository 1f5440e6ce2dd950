//! Upload ingestion: CSV decoding and schema validation.
//!
//! [`prepare`] runs the whole pure half of the upload path (decode, validate,
//! aggregate) so that nothing touches the store until the input is known good.

pub mod reader;
pub mod validator;

pub use reader::RawTable;
pub use validator::{validate, TableRecord, ValidatedTable};

use crate::analysis::{parse_rows, summarize_rows};
use crate::error::EquipResult;
use crate::models::NewDataset;
use tracing::debug;

/// Decode, validate and aggregate an upload without side effects.
pub fn prepare(filename: &str, bytes: &[u8]) -> EquipResult<NewDataset> {
    let raw = RawTable::from_csv(bytes)?;
    let table = validate(raw)?;
    let rows = parse_rows(&table)?;
    let summary = summarize_rows(&rows)?;

    debug!(
        "Prepared {}: {} rows, {} types",
        filename,
        summary.total_count,
        summary.type_distribution.len()
    );

    Ok(NewDataset {
        filename: filename.to_string(),
        summary,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EquipError;
    use crate::report::format_2dp;

    #[test]
    fn test_prepare_sample() {
        let csv = b"Equipment Name,Type,Flowrate,Pressure,Temperature\n\
                    Pump1,Pump,10,2,25\n\
                    Pump2,Valve,20,3,30\n";
        let dataset = prepare("sample.csv", csv).unwrap();

        assert_eq!(dataset.filename, "sample.csv");
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.summary.total_count, 2);
        assert_eq!(dataset.summary.avg_flowrate, 15.0);
    }

    #[test]
    fn test_prepare_reports_schema_before_content() {
        let err = prepare("bad.csv", b"Equipment Name,Type\n").unwrap_err();
        assert!(matches!(err, EquipError::MissingColumns(ref cols) if cols.len() == 3));
    }

    #[test]
    fn test_prepare_fixture_files() {
        let dataset = prepare(
            "sample_equipment_data.csv",
            include_bytes!("../../fixtures/sample_equipment_data.csv"),
        )
        .unwrap();

        assert_eq!(dataset.summary.total_count, 10);
        assert_eq!(dataset.summary.type_distribution.get("Pump"), Some(&3));
        assert_eq!(dataset.summary.type_distribution.values().sum::<usize>(), 10);
        assert_eq!(format_2dp(dataset.summary.avg_flowrate), "109.33");
        assert_eq!(format_2dp(dataset.summary.avg_pressure), "6.07");
        assert_eq!(format_2dp(dataset.summary.avg_temperature), "112.20");
        assert_eq!(dataset.rows[0].extra.get("Location").map(String::as_str), Some("Unit A"));

        let err = prepare(
            "missing_columns.csv",
            include_bytes!("../../fixtures/missing_columns.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, EquipError::MissingColumns(ref cols)
            if cols == &["Pressure".to_string(), "Temperature".to_string()]));

        let err = prepare(
            "bad_numeric.csv",
            include_bytes!("../../fixtures/bad_numeric.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, EquipError::InvalidNumeric { row: 3, ref column, .. }
            if column == "Flowrate"));
    }

    #[test]
    fn test_prepare_header_only_is_empty_dataset() {
        let err = prepare(
            "empty.csv",
            b"Equipment Name,Type,Flowrate,Pressure,Temperature\n",
        )
        .unwrap_err();
        assert!(matches!(err, EquipError::EmptyDataset));
    }
}
