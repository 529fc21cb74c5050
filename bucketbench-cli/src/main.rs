//! The `bucketbench` command line tool.
//!
//! Reads every object of a bucket on an S3-compatible service as fast as possible and reports
//! the achieved throughput. See [`config`] for how remotes and limits are configured.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod cli;
mod config;
mod observability;

fn main() -> anyhow::Result<()> {
    cli::execute()
}
