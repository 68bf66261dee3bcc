// src/lib.rs

pub mod aggregator; // Atomic outcome accounting shared by all workers
pub mod config;
pub mod constants;
pub mod driver; // End-to-end run orchestration
pub mod environment;
pub mod executor; // Fixed-budget worker scheduler
pub mod metrics; // Run-scoped latency histogram
pub mod operations;
pub mod publish; // JSON file and results-container sinks
pub mod simulated_store; // In-memory backend for the CLI and tests
pub mod store;
pub mod summary;


pub use aggregator::{OpOutcome, ResultAggregator};
pub use executor::{run, SchedulerOptions};
pub use operations::{BenchmarkOperation, OperationFactory, OperationResult, WorkloadKind};
pub use summary::RunSummary;
