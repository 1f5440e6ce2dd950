//! Multi-file ingestion for the command line.
//!
//! Files are read and prepared concurrently on the blocking pool, then stored
//! one by one in input order so the retention history does not depend on which
//! file finished parsing first.

use crate::error::{EquipError, ErrorKind};
use crate::ingest;
use crate::models::{NewDataset, OwnerId, UploadResponse};
use crate::retention::DatasetBackend;
use crate::service::EquipmentService;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result of ingesting one file.
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: Result<UploadResponse>,
}

impl BatchOutcome {
    /// Whether the file was refused because of its content, as opposed to an
    /// I/O or storage failure.
    pub fn is_rejected(&self) -> bool {
        match &self.result {
            Ok(_) => false,
            Err(e) => e
                .downcast_ref::<EquipError>()
                .is_some_and(|e| e.kind() == ErrorKind::InvalidInput),
        }
    }
}

/// Find every `*.csv` file under `dir`, sorted by path.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", dir.display()))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let is_csv = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

        if is_csv {
            files.push(entry.into_path());
        }
    }

    debug!("Discovered {} CSV file(s) under {}", files.len(), dir.display());
    Ok(files)
}

/// Read and prepare a single file without touching the store.
pub fn prepare_file(path: &Path) -> Result<NewDataset> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(ingest::prepare(&filename, &bytes)?)
}

/// Ingest `paths` for `owner`. Outcomes are returned in input order.
pub async fn ingest_files<B: DatasetBackend + 'static>(
    service: &Arc<EquipmentService<B>>,
    owner: &OwnerId,
    paths: Vec<PathBuf>,
    concurrency: usize,
    show_progress: bool,
) -> Vec<BatchOutcome> {
    let progress_bar = if show_progress && paths.len() > 1 {
        let pb = ProgressBar::new(paths.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let prepared: Vec<(PathBuf, Result<NewDataset>)> = stream::iter(paths.into_iter().map(|path| {
        let pb = progress_bar.clone();
        async move {
            let task_path = path.clone();
            let result = match tokio::task::spawn_blocking(move || prepare_file(&task_path)).await
            {
                Ok(result) => result,
                Err(e) => Err(anyhow::Error::new(e).context("Ingest task failed")),
            };
            pb.set_message(path.display().to_string());
            pb.inc(1);
            (path, result)
        }
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await;

    progress_bar.finish_and_clear();

    // Backend writes block, so commits also run on the blocking pool, one at a time.
    let mut outcomes = Vec::with_capacity(prepared.len());
    for (path, prepared) in prepared {
        let result = match prepared {
            Ok(dataset) => {
                let service = Arc::clone(service);
                let owner = owner.clone();
                match tokio::task::spawn_blocking(move || service.commit(&owner, dataset)).await {
                    Ok(committed) => committed
                        .with_context(|| format!("Failed to store {}", path.display())),
                    Err(e) => Err(anyhow::Error::new(e).context("Store task failed")),
                }
            }
            Err(e) => Err(e),
        };
        outcomes.push(BatchOutcome { path, result });
    }

    let accepted = outcomes.iter().filter(|o| o.result.is_ok()).count();
    info!(
        "Batch finished: {} accepted, {} failed",
        accepted,
        outcomes.len() - accepted
    );

    outcomes
}
