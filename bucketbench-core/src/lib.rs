//! Concurrent retrieval benchmark for object storage buckets.
//!
//! A run lists the keys of a bucket, retrieves every object on a bounded pool of tasks while
//! discarding the payload, and reports throughput, size and rate distributions and a histogram
//! of status codes.
//!
//! The pipeline:
//!
//! - The [`Enumerator`] lazily yields keys until the listing ends or a [`Limits`] is reached.
//! - The [`Dispatcher`] admits one key per free slot and spawns a retrieval for it.
//! - Each retrieval ([`worker::retrieve`]) drains one object and produces exactly one
//!   [`Sample`], whether it succeeds or not.
//! - The [`collector`] is the single consumer of all samples. It keeps running totals, logs
//!   progress and retains the history.
//! - [`stats::summarize`] computes the distributions and [`FinalReport`] emits the result.
//!
//! [`run()`] ties these together.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod collector;
pub mod dispatcher;
pub mod enumerator;
pub mod error;
pub mod limits;
pub mod report;
pub mod run;
pub mod sample;
pub mod stats;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use enumerator::Enumerator;
pub use error::{Error, Result};
pub use limits::{Limits, StopReason};
pub use report::{FinalReport, RunEnvironment};
pub use run::{DEFAULT_CONCURRENCY, RunOptions, RunState, run};
pub use sample::Sample;
pub use stats::{StatsSummary, Summary};
