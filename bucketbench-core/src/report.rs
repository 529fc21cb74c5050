//! The final report of a run.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytesize::ByteSize;
use serde::Serialize;
use yansi::Paint;

use crate::collector::RunningTotals;
use crate::error::Result;
use crate::stats::{StatsSummary, Summary};

/// Static facts about where and against what a run happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunEnvironment {
    /// Host name of the machine running the benchmark.
    pub host: String,
    /// Host (and port) of the storage endpoint.
    pub s3host: String,
    /// Whether the endpoint is reached over TLS.
    pub https: bool,
    /// The bucket being read.
    pub bucket_name: String,
}

impl RunEnvironment {
    /// Describes a run against `bucket_name` at `s3host`, on the local host.
    pub fn new(s3host: impl Into<String>, https: bool, bucket_name: impl Into<String>) -> Self {
        Self {
            host: hostname::get()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".into()),
            s3host: s3host.into(),
            https,
            bucket_name: bucket_name.into(),
        }
    }
}

/// Machine-readable result of a run.
///
/// Field names are part of the output format and must stay stable.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinalReport {
    /// Host name of the machine running the benchmark.
    pub host: String,
    /// Host (and port) of the storage endpoint.
    pub s3host: String,
    /// Whether the endpoint was reached over TLS.
    pub https: bool,
    /// Start of the sample collection, in seconds since the epoch.
    pub start_time: u64,
    /// Closure of the sample stream, in seconds since the epoch.
    pub end_time: u64,
    /// `end_time - start_time`.
    pub duration: u64,
    /// The bucket that was read.
    pub bucket_name: String,
    /// Sum of all sample sizes, including partial reads.
    pub downloaded_bytes: u64,
    /// Number of samples, including failed retrievals.
    pub downloaded_objects: u64,
    /// Aggregate throughput over the whole run, in bytes per second.
    pub download_rate: f64,
    /// Distribution of per-retrieval throughput.
    pub rate_stats: StatsSummary,
    /// Distribution of object sizes.
    pub size_stats: StatsSummary,
    /// Number of retrievals per status code. `0` counts failures without a status.
    pub status_codes: BTreeMap<u16, u64>,
    /// Precise run time, only shown in the human-readable summary.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl FinalReport {
    /// Assembles the report from the collected totals and the derived statistics.
    pub fn new(environment: &RunEnvironment, totals: &RunningTotals, summary: Summary) -> Self {
        let start_time = epoch_secs(totals.start);
        let end_time = epoch_secs(totals.end);

        Self {
            host: environment.host.clone(),
            s3host: environment.s3host.clone(),
            https: environment.https,
            start_time,
            end_time,
            duration: end_time.saturating_sub(start_time),
            bucket_name: environment.bucket_name.clone(),
            downloaded_bytes: totals.bytes,
            downloaded_objects: totals.count,
            download_rate: totals.rate(),
            rate_stats: summary.rate,
            size_stats: summary.size,
            status_codes: summary.status_codes,
            elapsed: totals.elapsed,
        }
    }

    /// Writes the report as a single line of JSON.
    pub fn emit(&self, mut out: impl Write) -> Result<()> {
        serde_json::to_writer(&mut out, self)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }

    /// Prints a human-readable summary to stderr.
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!(
            "{} {} objects, {} in {:.2?} at a rate of {} ({})",
            "Total downloaded".bold(),
            self.downloaded_objects.bold(),
            ByteSize::b(self.downloaded_bytes).bold(),
            self.elapsed,
            byte_rate(self.download_rate).bold().blue(),
            bit_rate(self.download_rate),
        );
        eprintln!("{}", distribution("size", &self.size_stats, byte_size));
        eprintln!("{}", distribution("rate", &self.rate_stats, byte_rate));

        let failures: u64 = self
            .status_codes
            .iter()
            .filter(|&(&status, _)| status != crate::sample::STATUS_OK)
            .map(|(_, count)| count)
            .sum();
        if failures > 0 {
            eprintln!("{}", format!("{failures} FAILURES").bold().red());
        }
    }
}

/// One summary line with the average and the main percentiles of a distribution.
fn distribution(label: &str, stats: &StatsSummary, show: impl Fn(f64) -> String) -> String {
    format!(
        "  {label} avg: {}; p50: {}; p90: {}; p99: {}",
        show(stats.mean).bold(),
        show(stats.p50),
        show(stats.p90),
        show(stats.p99),
    )
}

fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

fn byte_size(bytes: f64) -> String {
    ByteSize::b(bytes as u64).to_string()
}

/// Formats a throughput in bytes per second, e.g. `12.3 MiB/s`.
pub(crate) fn byte_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", ByteSize::b(bytes_per_sec as u64))
}

/// Formats a throughput as SI bits per second, e.g. `98.40 Mb/s`.
pub(crate) fn bit_rate(bytes_per_sec: f64) -> String {
    const PREFIXES: [&str; 5] = ["", "k", "M", "G", "T"];

    let mut value = bytes_per_sec * 8.0;
    let mut prefix = 0;
    while value >= 1000.0 && prefix < PREFIXES.len() - 1 {
        value /= 1000.0;
        prefix += 1;
    }
    format!("{value:.2} {}b/s", PREFIXES[prefix])
}
