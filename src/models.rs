//! Data models for equipment datasets.
//!
//! This module contains the core data structures that flow through the
//! ingestion pipeline: normalized rows, computed summaries, stored
//! dataset records and the projections handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column holding the equipment's display name.
pub const COL_EQUIPMENT_NAME: &str = "Equipment Name";
/// Column holding the equipment category.
pub const COL_TYPE: &str = "Type";
/// Numeric column: flow rate.
pub const COL_FLOWRATE: &str = "Flowrate";
/// Numeric column: pressure.
pub const COL_PRESSURE: &str = "Pressure";
/// Numeric column: temperature.
pub const COL_TEMPERATURE: &str = "Temperature";

/// Every column an uploaded table must carry, matched by exact name.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_EQUIPMENT_NAME,
    COL_TYPE,
    COL_FLOWRATE,
    COL_PRESSURE,
    COL_TEMPERATURE,
];

/// Numeric columns in the order the aggregator scans them.
pub const NUMERIC_COLUMNS: [&str; 3] = [COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE];

/// Store-assigned dataset identifier. Strictly increasing per insert.
pub type DatasetId = u64;

/// An already-authenticated principal that owns uploaded datasets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wrap an owner identifier handed over by the authentication layer.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single validated equipment measurement.
///
/// Serializes as a flat object keyed by the original column names, with any
/// extra columns from the upload carried through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "Equipment Name")]
    pub equipment_name: String,
    #[serde(rename = "Type")]
    pub equipment_type: String,
    #[serde(rename = "Flowrate")]
    pub flowrate: f64,
    #[serde(rename = "Pressure")]
    pub pressure: f64,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    /// Columns outside the required set, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Aggregate statistics for one dataset.
///
/// Averages are kept at full precision; rounding happens at presentation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Number of rows in the dataset.
    pub total_count: usize,
    /// Mean of the Flowrate column.
    pub avg_flowrate: f64,
    /// Mean of the Pressure column.
    pub avg_pressure: f64,
    /// Mean of the Temperature column.
    pub avg_temperature: f64,
    /// Row count per exact Type value.
    pub type_distribution: BTreeMap<String, usize>,
}

/// A dataset that passed validation and aggregation but has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDataset {
    pub filename: String,
    pub summary: Summary,
    pub rows: Vec<Row>,
}

/// A dataset as retained by the store. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: DatasetId,
    pub owner_id: OwnerId,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub summary: Summary,
    pub rows: Vec<Row>,
}

impl DatasetRecord {
    /// Project the record into its list-path form (no raw rows).
    pub fn listing(&self) -> DatasetListing {
        DatasetListing {
            id: self.id,
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
            total_count: self.summary.total_count,
            avg_flowrate: self.summary.avg_flowrate,
            avg_pressure: self.summary.avg_pressure,
            avg_temperature: self.summary.avg_temperature,
        }
    }
}

/// List-path projection of a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetListing {
    pub id: DatasetId,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub total_count: usize,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
}

/// Upload-path response: the new id, the normalized rows and the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: DatasetId,
    pub rows: Vec<Row>,
    /// Summary with averages rounded to two decimals.
    pub summary: Summary,
}
