//! Latency recording for one benchmark run
//!
//! HDR histogram (1µs .. 1h, 3 significant digits) behind a mutex so any worker
//! can record concurrently. The histogram's storage is fixed at construction,
//! so recording never reallocates regardless of how many samples arrive.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIGS, REPORTED_PERCENTILES};

/// Concurrency-safe latency histogram scoped to a single run
#[derive(Debug)]
pub struct LatencyRecorder {
    hist: Mutex<Histogram<u64>>,
    expected_samples: u64,
}

impl LatencyRecorder {
    /// `expected_samples` is the post-warm-up operation count of the run
    pub fn new(expected_samples: u64) -> Self {
        let mut hist = Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIGS)
            .expect("static histogram bounds are valid");
        hist.auto(false);
        Self {
            hist: Mutex::new(hist),
            expected_samples,
        }
    }

    /// Record one operation latency (clamped into the trackable range)
    pub fn record(&self, duration: Duration) {
        self.hist.lock().record(trackable_micros(duration)).ok();
    }

    /// Merge a worker-local histogram in one lock acquisition
    pub fn merge(&self, other: &Histogram<u64>) {
        self.hist.lock().add(other).ok();
    }

    pub fn len(&self) -> u64 {
        self.hist.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expected_samples(&self) -> u64 {
        self.expected_samples
    }

    /// Latency at percentile `p` (0..=100). Out-of-range requests saturate to the
    /// maximum recorded value; an empty recorder yields zero.
    pub fn percentile(&self, p: f64) -> Duration {
        let hist = self.hist.lock();
        if hist.is_empty() {
            return Duration::ZERO;
        }
        let micros = if !(0.0..100.0).contains(&p) || p.is_nan() {
            hist.max()
        } else {
            hist.value_at_quantile(p / 100.0).min(hist.max())
        };
        Duration::from_micros(micros)
    }

    /// Snapshot of the reported percentile set
    pub fn percentiles(&self) -> LatencyPercentiles {
        let hist = self.hist.lock();
        if hist.is_empty() {
            return LatencyPercentiles::default();
        }
        let [p50, p90, p95, p99, p999] = REPORTED_PERCENTILES
            .map(|p| Duration::from_micros(hist.value_at_quantile(p / 100.0).min(hist.max())));
        LatencyPercentiles {
            count: hist.len(),
            mean: Duration::from_micros(hist.mean() as u64),
            min: Duration::from_micros(hist.min()),
            p50,
            p90,
            p95,
            p99,
            p999,
            max: Duration::from_micros(hist.max()),
        }
    }
}

/// Fixed percentile set published with every run summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub count: u64,
    #[serde(with = "humantime_serde")]
    pub mean: Duration,
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub p50: Duration,
    #[serde(with = "humantime_serde")]
    pub p90: Duration,
    #[serde(with = "humantime_serde")]
    pub p95: Duration,
    #[serde(with = "humantime_serde")]
    pub p99: Duration,
    #[serde(with = "humantime_serde")]
    pub p999: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

/// Microseconds clamped into the histogram's trackable range
pub fn trackable_micros(duration: Duration) -> u64 {
    (duration.as_micros().min(u64::MAX as u128) as u64).clamp(1, HISTOGRAM_MAX_MICROS)
}

/// Fresh worker-local histogram with the same bounds as [`LatencyRecorder`]
pub fn local_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_MICROS, HISTOGRAM_SIGFIGS)
        .expect("static histogram bounds are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_len() {
        let rec = LatencyRecorder::new(2);
        assert!(rec.is_empty());
        rec.record(Duration::from_micros(100));
        rec.record(Duration::from_micros(200));
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.expected_samples(), 2);
    }

    #[test]
    fn test_sub_microsecond_samples_are_kept() {
        let rec = LatencyRecorder::new(1);
        rec.record(Duration::from_nanos(10));
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.percentile(50.0), Duration::from_micros(1));
    }

    #[test]
    fn test_percentiles_monotonic_and_idempotent() {
        let rec = LatencyRecorder::new(1000);
        for i in 1..=1000u64 {
            rec.record(Duration::from_micros(i * 10));
        }
        let p50 = rec.percentile(50.0);
        let p95 = rec.percentile(95.0);
        let p99 = rec.percentile(99.0);
        assert!(p50 <= p95 && p95 <= p99);
        assert_eq!(rec.percentile(99.0), p99);
        assert_eq!(rec.percentiles(), rec.percentiles());

        let mut last = Duration::ZERO;
        for p in REPORTED_PERCENTILES {
            let v = rec.percentile(p);
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn test_out_of_range_percentile_saturates_to_max() {
        let rec = LatencyRecorder::new(3);
        rec.record(Duration::from_micros(10));
        rec.record(Duration::from_micros(20));
        rec.record(Duration::from_micros(5000));
        let max = rec.percentiles().max;
        assert_eq!(rec.percentile(100.0), max);
        assert_eq!(rec.percentile(250.0), max);
        assert_eq!(rec.percentile(-1.0), max);
        assert!(rec.percentile(99.0) <= max);
    }

    #[test]
    fn test_empty_recorder_yields_zero() {
        let rec = LatencyRecorder::new(0);
        assert_eq!(rec.percentile(50.0), Duration::ZERO);
        assert_eq!(rec.percentiles(), LatencyPercentiles::default());
    }

    #[test]
    fn test_merge_local_histogram() {
        let rec = LatencyRecorder::new(3);
        rec.record(Duration::from_micros(10));
        let mut local = local_histogram();
        local.record(20).unwrap();
        local.record(30).unwrap();
        rec.merge(&local);
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let rec = Arc::new(LatencyRecorder::new(8 * 5000));
        let handles: Vec<_> = (0..8)
            .map(|w| {
                let rec = rec.clone();
                std::thread::spawn(move || {
                    for i in 0..5000u64 {
                        rec.record(Duration::from_micros(1 + (i + w) % 997));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(rec.len(), 8 * 5000);
    }
}
