//! Schema validation for uploaded tables.
//!
//! Only the structure is checked here: the required columns must be present.
//! Whether the table has rows worth averaging is the aggregator's concern.

use crate::error::{EquipError, EquipResult};
use crate::ingest::reader::RawTable;
use crate::models::{
    COL_EQUIPMENT_NAME, COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE, COL_TYPE, REQUIRED_COLUMNS,
};

/// Header positions of the required columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndex {
    equipment_name: usize,
    equipment_type: usize,
    flowrate: usize,
    pressure: usize,
    temperature: usize,
}

impl ColumnIndex {
    fn contains(&self, idx: usize) -> bool {
        [
            self.equipment_name,
            self.equipment_type,
            self.flowrate,
            self.pressure,
            self.temperature,
        ]
        .contains(&idx)
    }
}

/// A table confirmed to carry every required column.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTable {
    raw: RawTable,
    index: ColumnIndex,
}

/// Borrowed view of one data row of a validated table.
#[derive(Debug, Clone, Copy)]
pub struct TableRecord<'a> {
    headers: &'a [String],
    cells: &'a [String],
    index: ColumnIndex,
}

impl<'a> TableRecord<'a> {
    pub fn equipment_name(&self) -> &'a str {
        &self.cells[self.index.equipment_name]
    }

    pub fn equipment_type(&self) -> &'a str {
        &self.cells[self.index.equipment_type]
    }

    /// Raw text of a required column, `None` for any other name.
    pub fn required(&self, column: &str) -> Option<&'a str> {
        let idx = match column {
            COL_EQUIPMENT_NAME => self.index.equipment_name,
            COL_TYPE => self.index.equipment_type,
            COL_FLOWRATE => self.index.flowrate,
            COL_PRESSURE => self.index.pressure,
            COL_TEMPERATURE => self.index.temperature,
            _ => return None,
        };
        Some(&self.cells[idx])
    }

    /// Cells outside the required set, as `(column, value)`.
    ///
    /// Columns that repeat a required name are dropped; the first occurrence
    /// is the one the aggregator reads.
    pub fn extras(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let index = self.index;
        let (headers, cells) = (self.headers, self.cells);
        headers
            .iter()
            .zip(cells.iter())
            .enumerate()
            .filter(move |(idx, (name, _))| {
                !index.contains(*idx) && !REQUIRED_COLUMNS.contains(&name.as_str())
            })
            .map(|(_, (name, value))| (name.as_str(), value.as_str()))
    }
}

impl ValidatedTable {
    pub fn headers(&self) -> &[String] {
        self.raw.headers()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Iterate the data rows in upload order.
    pub fn records(&self) -> impl Iterator<Item = TableRecord<'_>> + '_ {
        let index = self.index;
        let headers = self.raw.headers();
        self.raw.rows().iter().map(move |cells| TableRecord {
            headers,
            cells: cells.as_slice(),
            index,
        })
    }
}

/// Check that `raw` has every required column.
///
/// Fails with [`EquipError::MissingColumns`] naming every absent column, in
/// the canonical required-column order, or with
/// [`EquipError::MalformedTable`] if a row is not as wide as the header.
pub fn validate(raw: RawTable) -> EquipResult<ValidatedTable> {
    raw.check_width()?;

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| raw.column_index(col).is_none())
        .map(|col| col.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(EquipError::MissingColumns(missing));
    }

    let position = |name: &str| raw.column_index(name).unwrap_or_default();
    let index = ColumnIndex {
        equipment_name: position(COL_EQUIPMENT_NAME),
        equipment_type: position(COL_TYPE),
        flowrate: position(COL_FLOWRATE),
        pressure: position(COL_PRESSURE),
        temperature: position(COL_TEMPERATURE),
    };

    Ok(ValidatedTable { raw, index })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_accepts_required_columns_in_any_order() {
        let raw = table(
            &["Temperature", "Type", "Flowrate", "Equipment Name", "Pressure"],
            &[&["25", "Pump", "10", "Pump1", "2"]],
        );
        let validated = validate(raw).unwrap();
        let record = validated.records().next().unwrap();

        assert_eq!(record.equipment_name(), "Pump1");
        assert_eq!(record.equipment_type(), "Pump");
        assert_eq!(record.required("Flowrate"), Some("10"));
        assert_eq!(record.required("Temperature"), Some("25"));
        assert_eq!(record.required("Location"), None);
    }

    #[test]
    fn test_validate_names_exactly_the_missing_columns() {
        let raw = table(
            &["Equipment Name", "Type", "Flowrate", "Humidity"],
            &[&["Pump1", "Pump", "10", "40"]],
        );
        match validate(raw) {
            Err(EquipError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["Pressure", "Temperature"]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_lists_every_column_for_empty_header() {
        match validate(RawTable::default()) {
            Err(EquipError::MissingColumns(cols)) => assert_eq!(cols.len(), 5),
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_is_case_sensitive() {
        let raw = table(
            &["equipment name", "Type", "Flowrate", "Pressure", "Temperature"],
            &[],
        );
        match validate(raw) {
            Err(EquipError::MissingColumns(cols)) => assert_eq!(cols, vec!["Equipment Name"]),
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_header_only_passes() {
        let raw = table(
            &["Equipment Name", "Type", "Flowrate", "Pressure", "Temperature"],
            &[],
        );
        let validated = validate(raw).unwrap();
        assert!(validated.is_empty());
    }

    #[test]
    fn test_extras_pass_through() {
        let raw = table(
            &["Equipment Name", "Location", "Type", "Flowrate", "Pressure", "Temperature", "Type"],
            &[&["Pump1", "Bay 4", "Pump", "10", "2", "25", "Shadow"]],
        );
        let validated = validate(raw).unwrap();
        let record = validated.records().next().unwrap();

        let extras: Vec<_> = record.extras().collect();
        assert_eq!(extras, vec![("Location", "Bay 4")]);
        assert_eq!(record.equipment_type(), "Pump");
    }
}
