// src/driver.rs
//
// Orchestrates one benchmark run end to end: container setup, worker sizing,
// factory resolution, execution, labelling and publishing.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::BenchmarkConfig;
use crate::constants::MONTHLY_COST_PER_THROUGHPUT_UNIT;
use crate::environment::EnvironmentInfo;
use crate::executor::{self, SchedulerOptions};
use crate::operations::{resolve_factory, OperationContext};
use crate::publish::{JsonFilePublisher, ResultsPublisher, StorePublisher};
use crate::store::{ContainerRef, StoreClient};
use crate::summary::RunSummary;

/// Estimated (per hour, per month) cost of keeping `throughput` provisioned
pub fn estimated_cost(throughput: u64) -> (f64, f64) {
    let per_month = MONTHLY_COST_PER_THROUGHPUT_UNIT * throughput as f64;
    let per_hour = per_month / (24.0 * 30.0);
    (per_hour, per_month)
}

pub struct RunDriver {
    config: BenchmarkConfig,
    store: Arc<dyn StoreClient>,
    show_progress: bool,
}

impl RunDriver {
    pub fn new(config: BenchmarkConfig, store: Arc<dyn StoreClient>) -> Self {
        Self {
            config,
            store,
            show_progress: false,
        }
    }

    /// Draw a progress bar over the attempted count
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        // Resolve everything that can fail statically before touching the backend
        let workload = cfg.workload()?;
        let template = cfg.load_template()?;
        let container = ContainerRef::new(cfg.database.as_str(), cfg.container.as_str());

        if cfg.cleanup_on_start {
            info!("Deleting container {} before the run", container);
            self.store
                .delete_container(&container)
                .await
                .with_context(|| format!("delete {}", container))?;
        }

        let created = self
            .store
            .ensure_container(&container, &cfg.partition_key_path, cfg.throughput)
            .await
            .with_context(|| format!("create or open container {}", container))?;
        if created {
            let (per_hour, per_month) = estimated_cost(cfg.throughput);
            info!(
                "The container will cost an estimated ${:.2} per hour (${:.2} per month)",
                per_hour, per_month
            );
        }

        let provisioned = self
            .store
            .read_throughput(&container)
            .await
            .with_context(|| format!("read throughput of {}", container))?;
        let Some(provisioned) = provisioned else {
            bail!(
                "Container {} must have a configured throughput (database-level shared throughput is not supported)",
                container
            );
        };
        info!("Using container {} with {} units/s", container, provisioned);

        let workers = cfg.worker_count(provisioned);
        let ops_per_worker = cfg.ops_per_worker(workers);
        info!(
            "Starting {} with {} workers, {} ops each",
            workload, workers, ops_per_worker
        );

        let prototype = OperationContext::new(
            self.store.clone(),
            container.clone(),
            &cfg.partition_key_path,
            &template,
        )?;
        let factory = resolve_factory(workload, prototype);

        let options = SchedulerOptions {
            progress_interval: cfg.progress_interval,
            diagnostics_threshold: cfg.diagnostics_latency_threshold,
            max_diagnostics: cfg.max_diagnostics,
            progress_bar: self.progress_bar(workers, ops_per_worker)?,
        };
        let mut summary =
            executor::run(factory, workers, ops_per_worker, cfg.warmup_fraction, options).await?;

        if cfg.cleanup_on_finish {
            info!("Deleting container {}", container);
            if let Err(e) = self.store.delete_container(&container).await {
                warn!("Failed to delete container {}: {:#}", container, e);
            }
        }

        summary.database = cfg.database.clone();
        summary.container = cfg.container.clone();
        summary.workload_type = workload.name().to_string();
        summary.consistency_level = Some(match &cfg.consistency_level {
            Some(level) if !level.trim().is_empty() => level.clone(),
            _ => self
                .store
                .default_consistency()
                .await
                .context("read default consistency")?,
        });
        summary.environment = Some(EnvironmentInfo::collect(cfg.location.clone()));
        if !cfg.enable_latency_percentiles {
            summary.latency = None;
        }

        for publisher in self.publishers() {
            publisher.publish(&summary).await?;
        }

        Ok(summary)
    }

    fn publishers(&self) -> Vec<Box<dyn ResultsPublisher>> {
        let cfg = &self.config;
        let mut sinks: Vec<Box<dyn ResultsPublisher>> = Vec::new();
        if let Some(dir) = &cfg.results_dir {
            sinks.push(Box::new(JsonFilePublisher::new(dir.clone())));
        }
        if cfg.publish_results {
            let results = ContainerRef::new(cfg.results_database(), cfg.results_container.as_str());
            sinks.push(Box::new(StorePublisher::new(self.store.clone(), results)));
        }
        sinks
    }

    fn progress_bar(&self, workers: usize, ops_per_worker: u64) -> Result<Option<ProgressBar>> {
        if !self.show_progress {
            return Ok(None);
        }
        let pb = ProgressBar::new(workers as u64 * ops_per_worker);
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ops ({per_sec}) {msg}",
        )?);
        pb.set_message(format!("{} workers", workers));
        Ok(Some(pb))
    }
}
