// src/config.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONTAINER, DEFAULT_DATABASE, DEFAULT_DIAGNOSTICS_LATENCY_THRESHOLD,
    DEFAULT_ITEM_COUNT, DEFAULT_MAX_DIAGNOSTICS, DEFAULT_PARTITION_KEY_PATH,
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_RESULTS_CONTAINER, DEFAULT_THROUGHPUT,
    DEFAULT_WARMUP_FRACTION, DEFAULT_WORKLOAD_TYPE, MAX_WORKERS_PER_CPU, THROUGHPUT_PER_WORKER,
};
use crate::operations::WorkloadKind;
use crate::simulated_store::SimulatedStoreSettings;

/// Sample document used when no item template file is configured
pub const DEFAULT_ITEM_TEMPLATE: &str = r#"{
  "id": "",
  "partitionKey": "",
  "name": "sample-player",
  "level": 42,
  "region": "westus2",
  "active": true,
  "tags": ["benchmark", "docstore"],
  "stats": { "wins": 120, "losses": 37, "score": 98231.5 }
}"#;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BenchmarkConfig {
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_container")]
    pub container: String,

    /// Partition key path of the benchmark container, e.g. "/partitionKey"
    #[serde(default = "default_partition_key_path")]
    pub partition_key_path: String,

    /// Registered workload name (case-insensitive)
    #[serde(default = "default_workload_type")]
    pub workload_type: String,

    /// Total operations across all workers
    #[serde(default = "default_item_count")]
    pub item_count: u64,

    /// Explicit worker count. When omitted it is derived from provisioned throughput.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Throughput (cost units/s) provisioned when the container has to be created
    #[serde(default = "default_throughput")]
    pub throughput: u64,

    /// Share of each worker's calls excluded from measurement, in [0, 1)
    #[serde(default = "default_warmup_fraction")]
    pub warmup_fraction: f64,

    /// JSON document used as the template for every write
    #[serde(default)]
    pub item_template_file: Option<PathBuf>,

    /// Consistency label for the summary; the backend default is used when omitted
    #[serde(default)]
    pub consistency_level: Option<String>,

    /// Free-form location label recorded in the environment metadata
    #[serde(default)]
    pub location: Option<String>,

    /// Write the run summary into the results container
    #[serde(default)]
    pub publish_results: bool,

    /// Defaults to `database` when omitted
    #[serde(default)]
    pub results_database: Option<String>,

    #[serde(default = "default_results_container")]
    pub results_container: String,

    /// Directory for JSON summary files; nothing is written when omitted
    #[serde(default)]
    pub results_dir: Option<PathBuf>,

    #[serde(default = "default_progress_interval", with = "humantime_serde")]
    pub progress_interval: Duration,

    /// Operations slower than this have their diagnostics captured
    #[serde(default = "default_diagnostics_threshold", with = "humantime_serde")]
    pub diagnostics_latency_threshold: Duration,

    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,

    #[serde(default)]
    pub cleanup_on_start: bool,

    #[serde(default)]
    pub cleanup_on_finish: bool,

    #[serde(default = "default_true")]
    pub enable_latency_percentiles: bool,

    /// Simulated backend behaviour
    #[serde(default)]
    pub backend: SimulatedStoreSettings,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_partition_key_path() -> String {
    DEFAULT_PARTITION_KEY_PATH.to_string()
}

fn default_workload_type() -> String {
    DEFAULT_WORKLOAD_TYPE.to_string()
}

fn default_item_count() -> u64 {
    DEFAULT_ITEM_COUNT
}

fn default_throughput() -> u64 {
    DEFAULT_THROUGHPUT
}

fn default_warmup_fraction() -> f64 {
    DEFAULT_WARMUP_FRACTION
}

fn default_results_container() -> String {
    DEFAULT_RESULTS_CONTAINER.to_string()
}

fn default_progress_interval() -> Duration {
    DEFAULT_PROGRESS_INTERVAL
}

fn default_diagnostics_threshold() -> Duration {
    DEFAULT_DIAGNOSTICS_LATENCY_THRESHOLD
}

fn default_max_diagnostics() -> usize {
    DEFAULT_MAX_DIAGNOSTICS
}

fn default_true() -> bool {
    true
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            container: default_container(),
            partition_key_path: default_partition_key_path(),
            workload_type: default_workload_type(),
            item_count: default_item_count(),
            concurrency: None,
            throughput: default_throughput(),
            warmup_fraction: default_warmup_fraction(),
            item_template_file: None,
            consistency_level: None,
            location: None,
            publish_results: false,
            results_database: None,
            results_container: default_results_container(),
            results_dir: None,
            progress_interval: default_progress_interval(),
            diagnostics_latency_threshold: default_diagnostics_threshold(),
            max_diagnostics: default_max_diagnostics(),
            cleanup_on_start: false,
            cleanup_on_finish: false,
            enable_latency_percentiles: true,
            backend: SimulatedStoreSettings::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Read and parse a YAML config file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let buf = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        serde_yaml::from_slice(&buf).with_context(|| format!("parse {}", path.display()))
    }

    /// Reject configurations the run cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            bail!("database name must not be empty");
        }
        if self.container.trim().is_empty() {
            bail!("container name must not be empty");
        }
        if !self.partition_key_path.starts_with('/') || self.partition_key_path.len() < 2 {
            bail!(
                "partition_key_path must start with '/' and name a field, got '{}'",
                self.partition_key_path
            );
        }
        if self.item_count == 0 {
            bail!("item_count must be at least 1");
        }
        if self.concurrency == Some(0) {
            bail!("concurrency must be at least 1 when set");
        }
        if !(0.0..1.0).contains(&self.warmup_fraction) {
            bail!(
                "warmup_fraction must be in [0, 1), got {}",
                self.warmup_fraction
            );
        }
        if !(0.0..=1.0).contains(&self.backend.failure_rate) {
            bail!(
                "backend.failure_rate must be in [0, 1], got {}",
                self.backend.failure_rate
            );
        }
        if self.publish_results && self.results_container.trim().is_empty() {
            bail!("results_container must not be empty when publish_results is set");
        }
        self.workload()?;
        Ok(())
    }

    pub fn workload(&self) -> Result<WorkloadKind> {
        self.workload_type.parse()
    }

    /// Explicit concurrency wins; otherwise one worker per THROUGHPUT_PER_WORKER
    /// units of provisioned throughput, capped per logical CPU
    pub fn worker_count(&self, provisioned_throughput: u64) -> usize {
        if let Some(n) = self.concurrency {
            return n.max(1);
        }
        let derived = (provisioned_throughput / THROUGHPUT_PER_WORKER).max(1) as usize;
        derived.min(num_cpus::get().max(1) * MAX_WORKERS_PER_CPU)
    }

    /// Integer share of `item_count` per worker, never below one
    pub fn ops_per_worker(&self, workers: usize) -> u64 {
        (self.item_count / workers.max(1) as u64).max(1)
    }

    pub fn results_database(&self) -> &str {
        self.results_database.as_deref().unwrap_or(&self.database)
    }

    /// Template document text, from `item_template_file` or the built-in sample
    pub fn load_template(&self) -> Result<String> {
        match &self.item_template_file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("read item template {}", path.display())),
            None => Ok(DEFAULT_ITEM_TEMPLATE.to_string()),
        }
    }
}
