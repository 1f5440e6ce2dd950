//! Request handling facade.
//!
//! [`EquipmentService`] wires ingestion, aggregation, retention and report
//! rendering into the upload, list, detail, report and delete paths. Every
//! call carries an already-authenticated [`OwnerId`].

use crate::error::{EquipError, EquipResult};
use crate::ingest;
use crate::models::{DatasetId, DatasetListing, DatasetRecord, NewDataset, OwnerId, UploadResponse};
use crate::report::{self, rounded_summary, Document, ReportFormat, ReportOptions};
use crate::retention::{DatasetBackend, RetentionStore};
use tracing::{info, warn};

pub struct EquipmentService<B> {
    store: RetentionStore<B>,
    report_options: ReportOptions,
}

impl<B: DatasetBackend> EquipmentService<B> {
    pub fn new(store: RetentionStore<B>, report_options: ReportOptions) -> Self {
        Self {
            store,
            report_options,
        }
    }

    pub fn store(&self) -> &RetentionStore<B> {
        &self.store
    }

    /// Upload path: decode, validate, aggregate, then store.
    ///
    /// Nothing is stored unless the whole table is valid.
    pub fn upload(
        &self,
        owner: &OwnerId,
        filename: &str,
        bytes: &[u8],
    ) -> EquipResult<UploadResponse> {
        let dataset = match ingest::prepare(filename, bytes) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!("Rejected upload {} for {}: {}", filename, owner, e);
                return Err(e);
            }
        };

        self.commit(owner, dataset)
    }

    /// Store a dataset that already went through [`ingest::prepare`].
    pub fn commit(&self, owner: &OwnerId, dataset: NewDataset) -> EquipResult<UploadResponse> {
        let record = self.store.insert(owner, dataset)?;

        info!(
            "Accepted upload {} as dataset {} ({} rows)",
            record.filename, record.id, record.summary.total_count
        );

        Ok(UploadResponse {
            id: record.id,
            summary: rounded_summary(&record.summary),
            rows: record.rows,
        })
    }

    /// List path: retained datasets for `owner`, newest first.
    pub fn list(&self, owner: &OwnerId) -> EquipResult<Vec<DatasetListing>> {
        Ok(self
            .store
            .list(owner)?
            .iter()
            .map(DatasetRecord::listing)
            .collect())
    }

    /// Detail path.
    pub fn detail(&self, owner: &OwnerId, id: DatasetId) -> EquipResult<DatasetRecord> {
        self.store.get(owner, id)
    }

    /// Report path: render a retained dataset.
    pub fn report(
        &self,
        owner: &OwnerId,
        id: DatasetId,
        format: ReportFormat,
    ) -> EquipResult<Document> {
        let record = self.store.get(owner, id)?;
        Ok(report::render(&record, format, &self.report_options))
    }

    /// Delete path.
    pub fn delete(&self, owner: &OwnerId, id: DatasetId) -> EquipResult<()> {
        match self.store.delete(owner, id) {
            Err(EquipError::NotFound { id }) => {
                warn!("Delete of unknown dataset {} by {}", id, owner);
                Err(EquipError::NotFound { id })
            }
            other => other,
        }
    }
}
