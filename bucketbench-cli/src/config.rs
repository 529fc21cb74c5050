//! Configuration for the benchmark.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags of the `run` and `config` commands
//! 2. Environment variables (prefixed with `BB__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `BB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `BB__CONCURRENCY=64` caps the number of concurrent retrievals
//! - `BB__LIMITS__MAX_SECONDS=300` stops admitting new retrievals after five minutes
//! - `BB__REMOTES__MINIO__ENDPOINT=http://localhost:9000` sets the endpoint of remote `minio`
//!
//! # YAML Configuration File
//!
//! ```yaml
//! concurrency: 64
//!
//! limits:
//!   max_seconds: 300
//!
//! remotes:
//!   minio:
//!     endpoint: http://localhost:9000
//!     region: us-east-1
//!     access_key_id: minioadmin
//!     secret_access_key: minioadmin
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bucketbench_core::{Limits, RunEnvironment, RunOptions};
use bucketbench_service::S3CompatibleConfig;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, ExposeSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use url::Url;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "BB__";

/// Newtype around `String` that protects against accidental logging of credentials. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// A named storage endpoint with its credentials.
///
/// Used in: [`Config::remotes`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Remote {
    /// URL of the S3-compatible service, e.g. `https://s3.example.com:9000`.
    ///
    /// The scheme determines whether TLS is used. Only `http` and `https` are accepted.
    pub endpoint: String,

    /// Region sent with signed requests.
    ///
    /// # Default
    ///
    /// `us-east-1`
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key id. If both keys are absent, credentials are taken from the environment.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: Option<SecretBox<ConfigSecret>>,

    /// Address buckets as part of the path instead of the host name.
    ///
    /// Most self-hosted services need this.
    ///
    /// # Default
    ///
    /// `true`
    #[serde(default = "default_path_style")]
    pub path_style: bool,

    /// Timeout for establishing a connection to the service.
    ///
    /// This does not bound the transfer of an object body. A slow retrieval runs until it
    /// completes or the connection fails.
    ///
    /// # Default
    ///
    /// `60s`
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_path_style() -> bool {
    true
}

fn default_request_timeout() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

/// Limits of a run.
///
/// Negative values mean "unlimited". Zero is rejected when the run is resolved.
///
/// Used in: [`Config::limits`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RunLimits {
    /// Maximum number of objects to retrieve.
    ///
    /// # Environment Variable
    ///
    /// `BB__LIMITS__MAX_OBJECTS`
    pub max_objects: i64,

    /// Number of seconds after which no new retrievals are started. Retrievals in progress
    /// still complete.
    ///
    /// # Environment Variable
    ///
    /// `BB__LIMITS__MAX_SECONDS`
    pub max_seconds: i64,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_objects: -1,
            max_seconds: -1,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Compact output with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never mix with the report on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Progress snapshots are logged at `INFO`. The `RUST_LOG` environment variable provides more
    /// granular control per module if needed, and `-v` raises the level to `DEBUG`.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `BB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`].
    ///
    /// # Environment Variable
    ///
    /// `BB__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Benchmark configuration.
///
/// See the module documentation for the sources configuration is loaded from.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Storage endpoints by name. The `run` command selects one with `--remote`.
    pub remotes: BTreeMap<String, Remote>,

    /// When to stop admitting new retrievals.
    pub limits: RunLimits,

    /// Maximum number of retrievals running at the same time.
    ///
    /// # Default
    ///
    /// `256`
    ///
    /// # Environment Variable
    ///
    /// `BB__CONCURRENCY`
    pub concurrency: u32,

    /// Number of keys requested per listing page.
    ///
    /// # Default
    ///
    /// `3000`
    ///
    /// # Environment Variable
    ///
    /// `BB__PAGE_SIZE`
    pub page_size: usize,

    /// Logging configuration. See [`Logging`].
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remotes: BTreeMap::new(),
            limits: RunLimits::default(),
            concurrency: bucketbench_core::DEFAULT_CONCURRENCY,
            page_size: bucketbench_service::DEFAULT_PAGE_SIZE,
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, the optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if environment variables
    /// contain invalid values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Combines the configuration with the command line into the settings of one run.
    pub fn resolve(&self, target: &Target) -> Result<RunSettings> {
        let Some(remote) = self.remotes.get(&target.remote) else {
            bail!("remote `{}` is not configured", target.remote);
        };
        if target.bucket.is_empty() {
            bail!("bucket name is required");
        }

        let endpoint = Url::parse(&remote.endpoint)
            .with_context(|| format!("invalid endpoint of remote `{}`", target.remote))?;
        let https = match endpoint.scheme() {
            "https" => true,
            "http" => false,
            scheme => bail!("unsupported endpoint scheme `{scheme}`, expected http or https"),
        };
        let Some(host) = endpoint.host_str() else {
            bail!("endpoint of remote `{}` has no host", target.remote);
        };
        let s3host = match endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        let limits = Limits::from_signed(
            target.objects.unwrap_or(self.limits.max_objects),
            target.seconds.unwrap_or(self.limits.max_seconds),
        )?;
        let options = RunOptions::new(limits, target.concurrency.unwrap_or(self.concurrency))?;

        let storage = S3CompatibleConfig {
            endpoint: s3host.clone(),
            https,
            region: remote.region.clone(),
            bucket: target.bucket.clone(),
            access_key: remote.access_key_id.clone(),
            secret_key: remote
                .secret_access_key
                .as_ref()
                .map(|secret| secret.expose_secret().as_str().to_owned()),
            path_style: remote.path_style,
            request_timeout: remote.request_timeout,
            page_size: self.page_size,
        };

        Ok(RunSettings {
            environment: RunEnvironment::new(s3host, https, target.bucket.clone()),
            storage,
            options,
        })
    }
}

/// What to benchmark, as given on the command line.
#[derive(Debug, Default)]
pub struct Target {
    /// Name of the remote in [`Config::remotes`].
    pub remote: String,
    /// Bucket to read.
    pub bucket: String,
    /// Overrides [`RunLimits::max_objects`].
    pub objects: Option<i64>,
    /// Overrides [`RunLimits::max_seconds`].
    pub seconds: Option<i64>,
    /// Overrides [`Config::concurrency`].
    pub concurrency: Option<u32>,
}

/// Fully resolved, immutable settings of one run.
#[derive(Debug)]
pub struct RunSettings {
    /// How to reach the bucket.
    pub storage: S3CompatibleConfig,
    /// Static facts for the report.
    pub environment: RunEnvironment,
    /// Limits and concurrency.
    pub options: RunOptions,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIO_YAML: &[u8] = br#"
        concurrency: 32
        limits:
            max_objects: 1000
        remotes:
            minio:
                endpoint: http://localhost:9000
                access_key_id: minioadmin
                secret_access_key: hunter2
            aws:
                endpoint: https://s3.eu-west-1.amazonaws.com
                region: eu-west-1
                path_style: false
                request_timeout: 5m
        "#;

    fn target(remote: &str) -> Target {
        Target {
            remote: remote.into(),
            bucket: "photos".into(),
            ..Target::default()
        }
    }

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();
            assert!(config.remotes.is_empty());
            assert_eq!(config.limits.max_objects, -1);
            assert_eq!(config.limits.max_seconds, -1);
            assert_eq!(config.concurrency, 256);
            assert_eq!(config.page_size, 3000);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(MINIO_YAML).unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.concurrency, 32);
            assert_eq!(config.limits.max_objects, 1000);
            assert_eq!(config.limits.max_seconds, -1);

            let minio = &dbg!(&config).remotes["minio"];
            assert_eq!(minio.endpoint, "http://localhost:9000");
            assert_eq!(minio.region, "us-east-1");
            assert_eq!(minio.access_key_id.as_deref(), Some("minioadmin"));
            assert_eq!(
                minio
                    .secret_access_key
                    .as_ref()
                    .unwrap()
                    .expose_secret()
                    .as_str(),
                "hunter2"
            );
            assert!(minio.path_style);
            assert_eq!(minio.request_timeout, Some(Duration::from_secs(60)));

            let aws = &config.remotes["aws"];
            assert_eq!(aws.region, "eu-west-1");
            assert!(!aws.path_style);
            assert!(aws.access_key_id.is_none());
            assert_eq!(aws.request_timeout, Some(Duration::from_secs(300)));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BB__CONCURRENCY", "8");
            jail.set_env("BB__LIMITS__MAX_SECONDS", "30");
            jail.set_env("BB__LOGGING__LEVEL", "debug");
            jail.set_env("BB__LOGGING__FORMAT", "json");
            jail.set_env("BB__REMOTES__LOCAL__ENDPOINT", "http://127.0.0.1:9000");

            let config = Config::load(None).unwrap();
            assert_eq!(config.concurrency, 8);
            assert_eq!(config.limits.max_seconds, 30);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);
            assert_eq!(config.remotes["local"].endpoint, "http://127.0.0.1:9000");

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(MINIO_YAML).unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("BB__REMOTES__MINIO__ENDPOINT", "https://minio.internal");
            jail.set_env("BB__CONCURRENCY", "4");

            let config = Config::load(Some(tempfile.path())).unwrap();
            // Env should overwrite the yaml config
            assert_eq!(config.remotes["minio"].endpoint, "https://minio.internal");
            assert_eq!(config.concurrency, 4);
            // Untouched yaml values survive
            assert_eq!(
                config.remotes["minio"].access_key_id.as_deref(),
                Some("minioadmin")
            );

            Ok(())
        });
    }

    #[test]
    fn secrets_are_redacted() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(MINIO_YAML).unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();
            let settings = config.resolve(&target("minio")).unwrap();

            assert!(!format!("{config:?}").contains("hunter2"));
            assert!(!format!("{settings:?}").contains("hunter2"));
            assert_eq!(settings.storage.secret_key.as_deref(), Some("hunter2"));

            Ok(())
        });
    }

    #[test]
    fn resolves_endpoint_and_limits() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(MINIO_YAML).unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            let settings = config.resolve(&target("minio")).unwrap();
            assert_eq!(settings.storage.endpoint, "localhost:9000");
            assert!(!settings.storage.https);
            assert_eq!(settings.storage.bucket, "photos");
            assert_eq!(settings.storage.page_size, 3000);
            assert_eq!(settings.environment.s3host, "localhost:9000");
            assert!(!settings.environment.https);
            assert_eq!(settings.environment.bucket_name, "photos");
            assert_eq!(settings.options.concurrency, 32);
            assert_eq!(settings.options.limits.max_objects, Some(1000));
            assert_eq!(settings.options.limits.max_duration, None);

            let settings = config.resolve(&target("aws")).unwrap();
            assert_eq!(settings.storage.endpoint, "s3.eu-west-1.amazonaws.com");
            assert!(settings.storage.https);
            assert_eq!(settings.storage.region, "eu-west-1");

            Ok(())
        });
    }

    #[test]
    fn command_line_overrides_config() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(MINIO_YAML).unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();
            let target = Target {
                objects: Some(-1),
                seconds: Some(10),
                concurrency: Some(2),
                ..target("minio")
            };

            let settings = config.resolve(&target).unwrap();
            assert_eq!(settings.options.limits.max_objects, None);
            assert_eq!(
                settings.options.limits.max_duration,
                Some(Duration::from_secs(10))
            );
            assert_eq!(settings.options.concurrency, 2);

            Ok(())
        });
    }

    #[test]
    fn invalid_targets_are_rejected() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(MINIO_YAML).unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("BB__REMOTES__FTP__ENDPOINT", "ftp://files.example.com");
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert!(config.resolve(&target("missing")).is_err());
            assert!(config.resolve(&target("ftp")).is_err());
            assert!(
                config
                    .resolve(&Target {
                        bucket: String::new(),
                        ..target("minio")
                    })
                    .is_err()
            );
            assert!(
                config
                    .resolve(&Target {
                        objects: Some(0),
                        ..target("minio")
                    })
                    .is_err()
            );
            assert!(
                config
                    .resolve(&Target {
                        seconds: Some(0),
                        ..target("minio")
                    })
                    .is_err()
            );
            assert!(
                config
                    .resolve(&Target {
                        concurrency: Some(0),
                        ..target("minio")
                    })
                    .is_err()
            );

            Ok(())
        });
    }
}
