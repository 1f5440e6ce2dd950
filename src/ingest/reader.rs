//! CSV decoding into an untyped table.

use crate::error::{EquipError, EquipResult};
use tracing::debug;

/// A decoded upload: one header row plus string cells, all rows the same width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table from already-split cells.
    ///
    /// Rows whose width differs from the header are rejected, matching what
    /// the CSV path does for ragged input.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> EquipResult<Self> {
        let table = Self { headers, rows };
        table.check_width()?;
        Ok(table)
    }

    /// Fail on the first row whose width differs from the header.
    pub(crate) fn check_width(&self) -> EquipResult<()> {
        match self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.headers.len())
        {
            Some((idx, row)) => Err(EquipError::MalformedTable(format!(
                "row {} has {} fields, header has {}",
                idx,
                row.len(),
                self.headers.len()
            ))),
            None => Ok(()),
        }
    }

    /// Decode CSV bytes. The first record is always the header.
    pub fn from_csv(bytes: &[u8]) -> EquipResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        let mut headers: Vec<String> = reader
            .headers()
            .map_err(|e| EquipError::MalformedTable(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if let Some(first) = headers.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| EquipError::MalformedTable(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!("Decoded CSV: {} columns, {} rows", headers.len(), rows.len());

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Position of `name` in the header, first occurrence wins.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_csv_basic() {
        let csv = b"Equipment Name,Type,Flowrate\nPump1,Pump,10\nValve1,Valve,4.5\n";
        let table = RawTable::from_csv(csv).unwrap();

        assert_eq!(table.headers(), ["Equipment Name", "Type", "Flowrate"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1], ["Valve1", "Valve", "4.5"]);
    }

    #[test]
    fn test_from_csv_keeps_cells_verbatim() {
        let csv = b"Type,Flowrate\n pump ,\" 10 \"\n";
        let table = RawTable::from_csv(csv).unwrap();
        assert_eq!(table.rows()[0], [" pump ", " 10 "]);
    }

    #[test]
    fn test_from_csv_header_only() {
        let table = RawTable::from_csv(b"Type,Flowrate\n").unwrap();
        assert_eq!(table.headers().len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_csv_empty_input() {
        let table = RawTable::from_csv(b"").unwrap();
        assert!(table.headers().is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_csv_strips_bom() {
        let table = RawTable::from_csv("\u{feff}Equipment Name,Type\nA,B\n".as_bytes()).unwrap();
        assert_eq!(table.column_index("Equipment Name"), Some(0));
    }

    #[test]
    fn test_from_csv_rejects_ragged_rows() {
        let err = RawTable::from_csv(b"a,b,c\n1,2,3\n4,5\n").unwrap_err();
        assert!(matches!(err, EquipError::MalformedTable(_)));
    }

    #[test]
    fn test_from_csv_rejects_invalid_utf8() {
        let err = RawTable::from_csv(b"a,b\n\xff\xfe,1\n").unwrap_err();
        assert!(matches!(err, EquipError::MalformedTable(_)));
    }

    #[test]
    fn test_new_rejects_width_mismatch() {
        let err = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![vec!["1".into(), "2".into()], vec!["3".into()]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_validate_rejects_ragged_table() {
        let raw = RawTable {
            headers: ["Equipment Name", "Type", "Flowrate", "Pressure", "Temperature"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: vec![vec!["Pump1".to_string(), "Pump".to_string()]],
        };

        let err = crate::ingest::validate(raw).unwrap_err();
        assert!(matches!(err, EquipError::MalformedTable(ref msg) if msg.contains("row 0")));
    }
}
