// src/summary.rs
//
// Final aggregate report of one benchmark run. This is also the document shape
// published to the results container, partitioned by the run's UTC date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::environment::EnvironmentInfo;
use crate::metrics::LatencyPercentiles;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    /// Partition key of the published summary document (`YYYY-MM-DD`)
    pub pk: String,
    pub database: String,
    pub container: String,
    pub workload_type: String,
    pub worker_count: usize,
    pub operations_per_worker: u64,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Calls excluded from latency, cost and throughput
    pub warmup_operations: u64,
    pub total_cost: f64,
    pub cost_per_operation: f64,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Successful calls outside the warm-up window per second of the whole run's
    /// wall clock. The clock includes prepare and warm-up, so this is a lower bound
    /// on the steady-state rate.
    pub throughput: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyPercentiles>,
    #[serde(default)]
    pub consistency_level: Option<String>,
    #[serde(default)]
    pub environment: Option<EnvironmentInfo>,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    #[serde(default)]
    pub failures: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Empty summary for a run that started at `started_at`
    pub fn new(workload_type: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pk: started_at.format("%Y-%m-%d").to_string(),
            database: String::new(),
            container: String::new(),
            workload_type: workload_type.into(),
            worker_count: 0,
            operations_per_worker: 0,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            warmup_operations: 0,
            total_cost: 0.0,
            cost_per_operation: 0.0,
            duration: Duration::ZERO,
            throughput: 0.0,
            latency: None,
            consistency_level: None,
            environment: None,
            diagnostics: Vec::new(),
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64 * 100.0
        }
    }

    /// Human-readable block for the console
    pub fn print(&self) {
        println!("\n=== Results: {} ===", self.workload_type);
        println!("Target: {}/{}", self.database, self.container);
        if let Some(level) = &self.consistency_level {
            println!("Consistency: {}", level);
        }
        println!("Workers: {} x {} ops", self.worker_count, self.operations_per_worker);
        println!(
            "Attempted: {}  Succeeded: {}  Failed: {}  ({:.2}% success)",
            self.attempted,
            self.succeeded,
            self.failed,
            self.success_rate()
        );
        println!("Warm-up ops excluded: {}", self.warmup_operations);
        println!("Wall time: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.2} ops/s", self.throughput);
        println!(
            "Total cost: {:.2}  Cost/op: {:.3}",
            self.total_cost, self.cost_per_operation
        );

        if let Some(l) = &self.latency {
            println!("\nLatency ({} samples):", l.count);
            println!("  mean:  {:>10.3} ms", ms(l.mean));
            println!("  p50:   {:>10.3} ms", ms(l.p50));
            println!("  p90:   {:>10.3} ms", ms(l.p90));
            println!("  p95:   {:>10.3} ms", ms(l.p95));
            println!("  p99:   {:>10.3} ms", ms(l.p99));
            println!("  p99.9: {:>10.3} ms", ms(l.p999));
            println!("  max:   {:>10.3} ms", ms(l.max));
        }

        if !self.failures.is_empty() {
            println!("\nFirst {} failures:", self.failures.len());
            for f in &self.failures {
                println!("  - {}", f);
            }
        }
        if !self.diagnostics.is_empty() {
            println!("\nSlow operation diagnostics captured: {}", self.diagnostics.len());
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
