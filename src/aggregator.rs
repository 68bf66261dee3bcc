// src/aggregator.rs
//
// Run-level accounting of operation outcomes.
//
// Every call increments `attempted`; successes increment `succeeded`. Cost and the
// measured-success count only include calls outside the warm-up window. All
// counters are atomics so workers never block each other on the hot path; the
// cost total is an f64 kept as bits in an AtomicU64 and updated with a CAS loop.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::constants::MAX_RETAINED_FAILURES;
use crate::operations::OperationResult;

/// Uniform representation of one `execute_once` call
#[derive(Debug)]
pub enum OpOutcome {
    Success(OperationResult),
    Failure(String),
}

impl OpOutcome {
    pub fn from_result(result: anyhow::Result<OperationResult>) -> Self {
        match result {
            Ok(r) => OpOutcome::Success(r),
            Err(e) => OpOutcome::Failure(format!("{:#}", e)),
        }
    }
}

/// f64 accumulator safe for concurrent adds
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn add(&self, value: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Snapshot of aggregated counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub warmup_attempted: u64,
    /// Successful calls outside the warm-up window
    pub measured_succeeded: u64,
    pub total_cost: f64,
}

impl AggregateSnapshot {
    pub fn failed(&self) -> u64 {
        self.attempted.saturating_sub(self.succeeded)
    }
}

#[derive(Debug)]
pub struct ResultAggregator {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    warmup_attempted: AtomicU64,
    measured_succeeded: AtomicU64,
    total_cost: AtomicF64,
    failures: Mutex<Vec<String>>,
    diagnostics: Mutex<Vec<String>>,
    diagnostics_threshold: Duration,
    max_diagnostics: usize,
}

impl ResultAggregator {
    pub fn new(diagnostics_threshold: Duration, max_diagnostics: usize) -> Self {
        Self {
            attempted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            warmup_attempted: AtomicU64::new(0),
            measured_succeeded: AtomicU64::new(0),
            total_cost: AtomicF64::default(),
            failures: Mutex::new(Vec::new()),
            diagnostics: Mutex::new(Vec::new()),
            diagnostics_threshold,
            max_diagnostics,
        }
    }

    /// Account for one call. `latency` decides whether its diagnostics are captured.
    pub fn add(&self, outcome: &OpOutcome, latency: Duration, warmup: bool) {
        // `attempted` is bumped before `succeeded`; snapshot() loads in reverse order
        self.attempted.fetch_add(1, Ordering::Release);
        if warmup {
            self.warmup_attempted.fetch_add(1, Ordering::Relaxed);
        }

        match outcome {
            OpOutcome::Success(result) => {
                self.succeeded.fetch_add(1, Ordering::Release);
                if !warmup {
                    self.measured_succeeded.fetch_add(1, Ordering::Release);
                    self.total_cost.add(result.cost.max(0.0));
                }
                if latency >= self.diagnostics_threshold {
                    self.capture_diagnostics(result, latency);
                }
            }
            OpOutcome::Failure(reason) => {
                let mut failures = self.failures.lock();
                if failures.len() < MAX_RETAINED_FAILURES {
                    failures.push(reason.clone());
                }
            }
        }
    }

    fn capture_diagnostics(&self, result: &OperationResult, latency: Duration) {
        if self.max_diagnostics == 0 {
            return;
        }
        let mut diagnostics = self.diagnostics.lock();
        if diagnostics.len() < self.max_diagnostics {
            // Only slow calls pay for formatting
            diagnostics.push(format!(
                "{{\"latencyUs\":{},\"diagnostics\":{}}}",
                latency.as_micros(),
                result.diagnostics_string()
            ));
        }
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        let measured_succeeded = self.measured_succeeded.load(Ordering::Acquire);
        let succeeded = self.succeeded.load(Ordering::Acquire);
        let attempted = self.attempted.load(Ordering::Acquire);
        AggregateSnapshot {
            attempted,
            succeeded,
            warmup_attempted: self.warmup_attempted.load(Ordering::Acquire),
            measured_succeeded,
            total_cost: self.total_cost.load(),
        }
    }

    /// First failure messages, capped
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().clone()
    }
}
