//! Orchestration of a complete benchmark run.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use bucketbench_service::BoxedStorage;
use tokio::sync::mpsc;

use crate::collector::{self, Collection};
use crate::dispatcher::Dispatcher;
use crate::enumerator::Enumerator;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::report::{FinalReport, RunEnvironment};
use crate::stats;

/// Default ceiling for concurrently running retrievals.
pub const DEFAULT_CONCURRENCY: u32 = 256;

/// Capacity of the sample stream between the workers and the collector.
const SAMPLE_BUFFER: usize = 1024;

/// Tunables of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// When to stop admitting new retrievals.
    pub limits: Limits,
    /// Maximum number of retrievals running at the same time.
    pub concurrency: u32,
}

impl RunOptions {
    /// Validates and creates run options.
    pub fn new(limits: Limits, concurrency: u32) -> Result<Self> {
        let options = Self {
            limits,
            concurrency,
        };
        options.validate()?;
        Ok(options)
    }

    /// Checks values that would prevent a run from ever finishing.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Configuration("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limits: Limits::UNLIMITED,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Phases of a run. A run only ever moves forward through these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    /// Nothing has started yet.
    Idle,
    /// Keys are being enumerated and retrievals dispatched.
    Downloading,
    /// Enumeration has ended; waiting for started retrievals and the collector.
    Draining,
    /// Computing statistics over the sample history.
    Summarizing,
    /// The final report has been emitted.
    Reported,
}

impl RunState {
    fn advance(&mut self, next: RunState) {
        debug_assert!(next > *self, "run state moved backwards");
        tracing::debug!(from = %self, to = %next, "run state changed");
        *self = next;
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Downloading => "downloading",
            RunState::Draining => "draining",
            RunState::Summarizing => "summarizing",
            RunState::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Runs the benchmark against the bucket of `storage` and writes the report to `out`.
///
/// The human-readable summary goes to stderr, the JSON report is written to `out` exactly
/// once. A listing failure aborts the run after all started retrievals have finished, and no
/// report is written in that case.
pub async fn run(
    storage: BoxedStorage,
    options: RunOptions,
    environment: &RunEnvironment,
    out: impl Write,
) -> Result<FinalReport> {
    options.validate()?;

    let mut state = RunState::Idle;
    tracing::info!(
        backend = storage.name(),
        bucket = storage.bucket(),
        concurrency = options.concurrency,
        max_objects = ?options.limits.max_objects,
        max_duration = ?options.limits.max_duration,
        "starting benchmark"
    );

    let dispatched = Arc::new(AtomicU64::new(0));
    let (samples, stream) = mpsc::channel(SAMPLE_BUFFER);
    let collector = tokio::spawn(collector::collect(stream, Arc::clone(&dispatched)));

    state.advance(RunState::Downloading);
    let mut enumerator = Enumerator::new(storage.as_ref(), options.limits);
    let dispatcher = Dispatcher::new(storage, options.concurrency, samples, dispatched);
    let listing = dispatcher.dispatch_all(&mut enumerator).await;

    state.advance(RunState::Draining);
    dispatcher.drain().await;
    let Collection {
        totals, history, ..
    } = collector.await?;
    debug_assert_eq!(history.len() as u64, totals.count);

    if let Err(err) = listing {
        return Err(Error::Listing(err));
    }

    state.advance(RunState::Summarizing);
    let summary = stats::summarize(&history);
    let report = FinalReport::new(environment, &totals, summary);

    report.print_summary();
    report.emit(out)?;
    state.advance(RunState::Reported);

    Ok(report)
}
