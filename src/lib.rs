//! equipstat - equipment measurement statistics with bounded retention.
//!
//! Uploaded CSV tables are validated, summarized and stored per owner. Only
//! the most recent uploads of each owner are kept, and any retained dataset
//! can be rendered as a Markdown or JSON report.
//!
//! The pipeline is: [`ingest`] (decode + schema check) → [`analysis`]
//! (typed rows + summary) → [`retention`] (bounded store) → [`report`].
//! [`service::EquipmentService`] ties them together.

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod report;
pub mod retention;
pub mod service;

pub use error::{EquipError, EquipResult, ErrorBody, ErrorKind, PersistenceError};
pub use models::{
    DatasetId, DatasetListing, DatasetRecord, NewDataset, OwnerId, Row, Summary, UploadResponse,
};
pub use report::{Document, ReportFormat, ReportOptions};
pub use retention::{DatasetBackend, JsonFileBackend, MemoryBackend, RetentionStore};
pub use service::EquipmentService;
