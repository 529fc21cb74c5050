//! Fan-in of all samples into running totals and the sample history.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use bytesize::ByteSize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::report::{bit_rate, byte_rate};
use crate::sample::Sample;

/// Minimum wall time between two progress snapshots.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Aggregates of all samples received so far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunningTotals {
    /// Number of samples.
    pub count: u64,
    /// Sum of all sample sizes in bytes.
    pub bytes: u64,
    /// When the collector started.
    pub start: SystemTime,
    /// When the sample stream closed. Equal to `start` while collection is running.
    pub end: SystemTime,
    /// Time between `start` and the last update.
    pub elapsed: Duration,
}

impl RunningTotals {
    fn new(start: SystemTime) -> Self {
        Self {
            count: 0,
            bytes: 0,
            start,
            end: start,
            elapsed: Duration::ZERO,
        }
    }

    /// Aggregate throughput in bytes per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Everything the collector observed once the sample stream has closed.
#[derive(Debug)]
pub struct Collection {
    /// Final totals.
    pub totals: RunningTotals,
    /// All samples in arrival order.
    pub history: Vec<Sample>,
    /// Number of progress snapshots that were logged.
    pub progress_reports: u64,
}

/// Drains `samples` until every sender is dropped.
///
/// `dispatched` is the number of retrievals started so far. It is only read here, to report
/// the approximate number of retrievals in flight.
pub async fn collect(samples: mpsc::Receiver<Sample>, dispatched: Arc<AtomicU64>) -> Collection {
    collect_with_interval(samples, dispatched, PROGRESS_INTERVAL).await
}

pub(crate) async fn collect_with_interval(
    mut samples: mpsc::Receiver<Sample>,
    dispatched: Arc<AtomicU64>,
    progress_interval: Duration,
) -> Collection {
    let started = Instant::now();
    let mut totals = RunningTotals::new(SystemTime::now());
    let mut history = Vec::new();
    let mut last_progress = started;
    let mut progress_reports = 0;

    while let Some(sample) = samples.recv().await {
        totals.count += 1;
        totals.bytes += sample.size;
        totals.elapsed = started.elapsed();

        if last_progress.elapsed() >= progress_interval {
            let in_flight = dispatched.load(Ordering::Relaxed).saturating_sub(totals.count);
            let rate = totals.rate();
            tracing::info!(
                in_flight,
                objects = totals.count,
                total = %ByteSize::b(totals.bytes),
                elapsed = ?totals.elapsed,
                rate = %byte_rate(rate),
                bits = %bit_rate(rate),
                key = %sample.key,
                size = %ByteSize::b(sample.size),
                "download progress"
            );
            last_progress = Instant::now();
            progress_reports += 1;
        }

        history.push(sample);
    }

    totals.elapsed = started.elapsed();
    totals.end = totals.start + totals.elapsed;
    tracing::debug!(objects = totals.count, "sample stream closed");

    Collection {
        totals,
        history,
        progress_reports,
    }
}
