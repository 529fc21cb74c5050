use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Directives used when `RUST_LOG` is not set: everything of bucketbench at `DEBUG`, other
/// crates only on errors.
const DEFAULT_DIRECTIVES: &str = "ERROR,bucketbench=DEBUG,bucketbench_core=DEBUG,\
    bucketbench_service=DEBUG,bucketbench_test=DEBUG";

/// Initialize the logger for testing.
///
/// Output goes to the writer of the Rust test runner, so it only shows for failing tests or
/// with `--nocapture`. `RUST_LOG` replaces the default directives, e.g.
/// `RUST_LOG=bucketbench_core=trace` to follow every retrieval in paused-time tests. Closed
/// spans are logged with their busy and idle time.
///
/// # Example
///
/// ```
/// bucketbench_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
