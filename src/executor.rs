// src/executor.rs
//
// Fixed-budget execution scheduler.
//
// Spawns exactly `workers` tasks. Each builds its own operation from the factory,
// prepares it, and issues `ops_per_worker` sequential calls. The first
// floor(ops_per_worker * warmup_fraction) calls of every worker are counted as
// attempted but kept out of latency, cost and throughput. A failed call is logged
// and the worker moves on; a failed prepare aborts the whole run.

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use futures::future::join_all;
use hdrhistogram::Histogram;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::aggregator::{AggregateSnapshot, OpOutcome, ResultAggregator};
use crate::constants::{
    DEFAULT_DIAGNOSTICS_LATENCY_THRESHOLD, DEFAULT_MAX_DIAGNOSTICS, DEFAULT_PROGRESS_INTERVAL,
    WARMUP_FRACTION_SCALE,
};
use crate::metrics::{local_histogram, trackable_micros, LatencyRecorder};
use crate::operations::{BenchmarkOperation, OperationFactory, PreparePolicy};
use crate::summary::RunSummary;

/// Knobs that do not change what is measured
#[derive(Clone)]
pub struct SchedulerOptions {
    /// Period of the progress log line; zero disables the reporter
    pub progress_interval: Duration,
    pub diagnostics_threshold: Duration,
    pub max_diagnostics: usize,
    /// Advanced once per attempted call when present
    pub progress_bar: Option<ProgressBar>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            diagnostics_threshold: DEFAULT_DIAGNOSTICS_LATENCY_THRESHOLD,
            max_diagnostics: DEFAULT_MAX_DIAGNOSTICS,
            progress_bar: None,
        }
    }
}

/// What a worker hands back when it finishes
struct WorkerReport {
    workload: &'static str,
    hist: Histogram<u64>,
    /// (database, container) of the first successful call
    target: Option<(String, String)>,
}

/// Number of leading calls per worker excluded from measurement
pub fn warmup_operations(ops_per_worker: u64, warmup_fraction: f64) -> u64 {
    // Fixed point so that 100 * 0.29 floors to 29, not 28
    let parts = (warmup_fraction.clamp(0.0, 1.0) * WARMUP_FRACTION_SCALE as f64).round() as u128;
    (ops_per_worker as u128 * parts / WARMUP_FRACTION_SCALE as u128) as u64
}

/// Run the benchmark to completion and summarize it
pub async fn run(
    factory: OperationFactory,
    workers: usize,
    ops_per_worker: u64,
    warmup_fraction: f64,
    options: SchedulerOptions,
) -> Result<RunSummary> {
    if workers == 0 {
        bail!("worker count must be at least 1");
    }
    if ops_per_worker == 0 {
        bail!("operations per worker must be at least 1");
    }
    if !(0.0..1.0).contains(&warmup_fraction) {
        bail!("warm-up fraction must be in [0, 1), got {}", warmup_fraction);
    }

    let warmup_ops = warmup_operations(ops_per_worker, warmup_fraction);
    let recorder = LatencyRecorder::new(workers as u64 * (ops_per_worker - warmup_ops));
    let agg = Arc::new(ResultAggregator::new(
        options.diagnostics_threshold,
        options.max_diagnostics,
    ));
    let abort = Arc::new(AtomicBool::new(false));

    info!(
        "Starting {} workers x {} ops ({} warm-up ops per worker)",
        workers, ops_per_worker, warmup_ops
    );
    let started_at = Utc::now();
    let start = Instant::now();

    let reporter = (!options.progress_interval.is_zero()).then(|| {
        tokio::spawn(progress_reporter(
            agg.clone(),
            options.progress_interval,
            workers as u64 * ops_per_worker,
        ))
    });

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let factory = factory.clone();
        let agg = agg.clone();
        let abort = abort.clone();
        let pb = options.progress_bar.clone();

        handles.push(tokio::spawn(async move {
            let op = factory();
            run_worker(worker, op, ops_per_worker, warmup_ops, &agg, &abort, pb.as_ref()).await
        }));
    }

    let results = join_all(handles).await;
    let duration = start.elapsed();
    if let Some(reporter) = reporter {
        reporter.abort();
    }

    let mut first_error = None;
    let mut target = None;
    let mut workload = "";
    for (worker, res) in results.into_iter().enumerate() {
        let report = match res {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
                continue;
            }
            Err(join_err) => {
                error!("Worker {} panicked: {}", worker, join_err);
                first_error.get_or_insert(anyhow!("worker {} panicked: {}", worker, join_err));
                continue;
            }
        };
        recorder.merge(&report.hist);
        workload = report.workload;
        if target.is_none() {
            target = report.target;
        }
    }

    if let Some(pb) = &options.progress_bar {
        pb.finish_with_message(format!("{} workers done", workers));
    }
    if let Some(e) = first_error {
        return Err(e.context("benchmark run aborted"));
    }

    let snap = agg.snapshot();
    debug!(
        "Recorded {} of {} expected latency samples",
        recorder.len(),
        recorder.expected_samples()
    );

    let mut summary = RunSummary::new(workload, started_at);
    if let Some((database, container)) = target {
        summary.database = database;
        summary.container = container;
    }
    summary.worker_count = workers;
    summary.operations_per_worker = ops_per_worker;
    summary.attempted = snap.attempted;
    summary.succeeded = snap.succeeded;
    summary.failed = snap.failed();
    summary.warmup_operations = snap.warmup_attempted;
    summary.total_cost = snap.total_cost;
    summary.cost_per_operation = if snap.measured_succeeded > 0 {
        snap.total_cost / snap.measured_succeeded as f64
    } else {
        0.0
    };
    summary.duration = duration;
    summary.throughput = snap.measured_succeeded as f64 / duration.as_secs_f64().max(1e-9);
    summary.latency = Some(recorder.percentiles());
    summary.failures = agg.failures();
    summary.diagnostics = agg.diagnostics();
    summary.finished_at = Utc::now();

    info!(
        "✓ Run complete: {}/{} succeeded in {:.2}s ({:.1} ops/s)",
        summary.succeeded,
        summary.attempted,
        duration.as_secs_f64(),
        summary.throughput
    );
    Ok(summary)
}

async fn run_worker(
    worker: usize,
    mut op: Box<dyn BenchmarkOperation>,
    ops_per_worker: u64,
    warmup_ops: u64,
    agg: &ResultAggregator,
    abort: &AtomicBool,
    pb: Option<&ProgressBar>,
) -> Result<WorkerReport> {
    let policy = op.prepare_policy();
    let mut hist = local_histogram();
    let mut target = None;

    for i in 0..ops_per_worker {
        if abort.load(Ordering::Relaxed) {
            debug!("Worker {} stopping at iteration {}: run aborted", worker, i);
            break;
        }

        if i == 0 || policy == PreparePolicy::EveryIteration {
            if let Err(e) = op.prepare().await {
                abort.store(true, Ordering::Relaxed);
                error!("Worker {} prepare failed for {}: {:#}", worker, op.workload(), e);
                return Err(e.context(format!("worker {} prepare failed", worker)));
            }
        }

        let t0 = Instant::now();
        let outcome = OpOutcome::from_result(op.execute_once().await);
        let elapsed = t0.elapsed();
        let warmup = i < warmup_ops;

        match &outcome {
            OpOutcome::Success(result) => {
                if !warmup {
                    hist.record(trackable_micros(elapsed)).ok();
                }
                if target.is_none() {
                    target = Some((result.database.clone(), result.container.clone()));
                }
            }
            OpOutcome::Failure(reason) => {
                warn!(worker, iteration = i, "Operation failed: {}", reason);
            }
        }
        agg.add(&outcome, elapsed, warmup);

        if let Some(pb) = pb {
            pb.inc(1);
        }
    }

    Ok(WorkerReport {
        workload: op.workload().name(),
        hist,
        target,
    })
}

/// Log a progress line every `interval` until aborted
async fn progress_reporter(agg: Arc<ResultAggregator>, interval: Duration, total: u64) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    let mut last = AggregateSnapshot::default();
    let mut last_at = Instant::now();

    loop {
        ticker.tick().await;
        let now = agg.snapshot();
        let secs = last_at.elapsed().as_secs_f64().max(1e-9);
        let ops_rate = (now.attempted - last.attempted) as f64 / secs;
        let cost_rate = (now.total_cost - last.total_cost) / secs;
        info!(
            "📊 {}/{} attempted, {} succeeded, {} failed | {:.0} ops/s, {:.1} cost/s",
            now.attempted,
            total,
            now.succeeded,
            now.failed(),
            ops_rate,
            cost_rate
        );
        last = now;
        last_at = Instant::now();
    }
}
