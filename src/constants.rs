// src/constants.rs
//
// Central location for all constants used throughout docstore-bench
// This makes tuning and maintenance easier by having all magic numbers in one place

use std::time::Duration;

// =============================================================================
// Run Defaults
// =============================================================================

/// Default total number of operations issued across all workers
/// User can override via config: item_count
pub const DEFAULT_ITEM_COUNT: u64 = 200_000;

/// Default fraction of each worker's share treated as warm-up
/// User can override via config: warmup_fraction
pub const DEFAULT_WARMUP_FRACTION: f64 = 0.01;

/// Fixed-point resolution used when applying the warm-up fraction
pub const WARMUP_FRACTION_SCALE: u64 = 1_000_000_000;

/// Default partition-key field path of the benchmark container
pub const DEFAULT_PARTITION_KEY_PATH: &str = "/partitionKey";

/// Default workload name when none is configured
pub const DEFAULT_WORKLOAD_TYPE: &str = "Insert";

/// Default database / container names
pub const DEFAULT_DATABASE: &str = "db";
pub const DEFAULT_CONTAINER: &str = "data";
pub const DEFAULT_RESULTS_CONTAINER: &str = "runsummary";

/// Partition-key path and throughput of a results container created on demand
pub const RESULTS_PARTITION_KEY_PATH: &str = "/pk";
pub const RESULTS_CONTAINER_THROUGHPUT: u64 = 400;

/// Default provisioned throughput (cost units per second) of a new container
pub const DEFAULT_THROUGHPUT: u64 = 400_000;

// =============================================================================
// Worker Pool Sizing
// =============================================================================

/// Provisioned cost units per second that justify one additional worker
pub const THROUGHPUT_PER_WORKER: u64 = 1_000;

/// Upper bound on derived workers, per logical CPU
pub const MAX_WORKERS_PER_CPU: usize = 50;

// =============================================================================
// Workload Shapes
// =============================================================================

/// Partition-key value used by every single-partition workload
pub const FIXED_PARTITION_KEY: &str = "fixed";

/// Number of documents seeded by each query workload's prepare step
pub const QUERY_SEED_BATCH: usize = 10;

/// Field used by filter and IN-list queries
pub const FILTER_FIELD: &str = "fieldValue";

/// Timestamp field used by the date-range query
pub const UPDATE_TIME_FIELD: &str = "UpdateTime";

/// Date-range query looks back this many days
pub const DATETIME_LOOKBACK_DAYS: i64 = 5;

/// Page size hints handed to the backend per query shape
pub const FILTER_QUERY_PAGE_SIZE: usize = 1;
pub const MULTI_ROW_QUERY_PAGE_SIZE: usize = 5;

// =============================================================================
// Metrics and Histogram Configuration
// =============================================================================

/// Highest trackable latency in microseconds (1 hour)
pub const HISTOGRAM_MAX_MICROS: u64 = 3_600_000_000;

/// Significant figures kept by the latency histogram
pub const HISTOGRAM_SIGFIGS: u8 = 3;

/// Percentiles reported in every run summary
pub const REPORTED_PERCENTILES: [f64; 5] = [50.0, 90.0, 95.0, 99.0, 99.9];

/// Number of failure messages retained for the run summary
pub const MAX_RETAINED_FAILURES: usize = 20;

/// Default cap on slow-operation diagnostics kept in the summary
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 10;

/// Default latency above which an operation's diagnostics are captured
pub const DEFAULT_DIAGNOSTICS_LATENCY_THRESHOLD: Duration = Duration::from_millis(100);

// =============================================================================
// Progress Reporting
// =============================================================================

/// Default interval between progress snapshots
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Simulated Backend Defaults
// =============================================================================

/// Mean simulated round trip (microseconds)
pub const DEFAULT_SIM_LATENCY_MICROS: u64 = 500;

/// Cost charged by the simulated store
pub const SIM_WRITE_COST: f64 = 5.71;
pub const SIM_READ_COST: f64 = 1.0;
pub const SIM_QUERY_BASE_COST: f64 = 2.79;
pub const SIM_QUERY_ROW_COST: f64 = 0.3;

// =============================================================================
// Container Cost Estimate
// =============================================================================

/// Estimated monthly cost per provisioned cost unit per second
pub const MONTHLY_COST_PER_THROUGHPUT_UNIT: f64 = 0.06;
