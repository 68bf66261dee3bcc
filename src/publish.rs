//! Publishing of run summaries
//!
//! Two sinks are provided:
//! - JSON files: `<results_dir>/docbench-<YYYYMMDD-HHMMSS>-<workload>.json`
//! - A results container in the document store, partitioned by the summary's `pk`

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::constants::{RESULTS_CONTAINER_THROUGHPUT, RESULTS_PARTITION_KEY_PATH};
use crate::operations::expect_status;
use crate::store::{ContainerRef, StoreClient, STATUS_CREATED};
use crate::summary::RunSummary;

#[async_trait]
pub trait ResultsPublisher: Send + Sync {
    /// Persist `summary`; returns where it went
    async fn publish(&self, summary: &RunSummary) -> Result<String>;
}

/// Writes one pretty-printed JSON file per run
pub struct JsonFilePublisher {
    dir: PathBuf,
}

impl JsonFilePublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_path(&self, summary: &RunSummary) -> PathBuf {
        self.dir.join(format!(
            "docbench-{}-{}.json",
            summary.started_at.format("%Y%m%d-%H%M%S"),
            summary.workload_type
        ))
    }
}

#[async_trait]
impl ResultsPublisher for JsonFilePublisher {
    async fn publish(&self, summary: &RunSummary) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create results directory: {}", self.dir.display()))?;

        let path = self.file_path(summary);
        let body = serde_json::to_vec_pretty(summary).context("serialize run summary")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("write {}", path.display()))?;

        info!("Run summary written to {}", path.display());
        Ok(path.display().to_string())
    }
}

/// Stores the summary as a document in a results container
pub struct StorePublisher {
    store: Arc<dyn StoreClient>,
    container: ContainerRef,
}

impl StorePublisher {
    pub fn new(store: Arc<dyn StoreClient>, container: ContainerRef) -> Self {
        Self { store, container }
    }
}

#[async_trait]
impl ResultsPublisher for StorePublisher {
    async fn publish(&self, summary: &RunSummary) -> Result<String> {
        self.store
            .ensure_container(
                &self.container,
                RESULTS_PARTITION_KEY_PATH,
                RESULTS_CONTAINER_THROUGHPUT,
            )
            .await
            .with_context(|| format!("prepare results container {}", self.container))?;

        let payload = serde_json::to_vec(summary).context("serialize run summary")?;
        let resp = self
            .store
            .create_document(&self.container, &summary.pk, payload)
            .await
            .with_context(|| format!("publish run summary to {}", self.container))?;
        expect_status(resp.status, STATUS_CREATED, "publish run summary")?;

        info!("Run summary {} published to {}", summary.id, self.container);
        Ok(format!("{}/{}", self.container, summary.id))
    }
}
