//! Stopping limits for a run and the admission check that enforces them.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Limits on how much work a run starts.
///
/// Limits only gate the admission of new retrievals. Retrievals that were already admitted
/// always run to completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of objects to retrieve.
    pub max_objects: Option<u64>,
    /// Maximum time after the start of the enumeration during which new retrievals start.
    pub max_duration: Option<Duration>,
}

impl Limits {
    /// No limits: every object in the bucket is retrieved.
    pub const UNLIMITED: Self = Self {
        max_objects: None,
        max_duration: None,
    };

    /// Builds limits from the signed values used on the command line and in configuration.
    ///
    /// Negative values mean "unlimited". Zero is rejected, since a run that may not start any
    /// retrieval is certainly a mistake.
    pub fn from_signed(max_objects: i64, max_seconds: i64) -> Result<Self> {
        if max_objects == 0 {
            return Err(Error::Configuration(
                "object limit must not be zero, use a negative value for no limit".into(),
            ));
        }
        if max_seconds == 0 {
            return Err(Error::Configuration(
                "duration limit must not be zero, use a negative value for no limit".into(),
            ));
        }

        Ok(Self {
            max_objects: u64::try_from(max_objects).ok(),
            max_duration: u64::try_from(max_seconds).ok().map(Duration::from_secs),
        })
    }
}

/// Why the enumeration stopped admitting objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The bucket listing has no more keys.
    Exhausted,
    /// The configured number of objects has been admitted.
    ObjectLimit,
    /// The configured duration has elapsed.
    DurationLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Exhausted => "listing exhausted",
            StopReason::ObjectLimit => "object limit reached",
            StopReason::DurationLimit => "duration limit reached",
        };
        f.write_str(reason)
    }
}

/// Tracks admitted objects against [`Limits`].
///
/// This is the only place where limits are checked.
#[derive(Debug)]
pub struct Admission {
    limits: Limits,
    started: Instant,
    admitted: u64,
}

impl Admission {
    /// Starts the clock for the duration limit.
    pub fn start(limits: Limits) -> Self {
        Self {
            limits,
            started: Instant::now(),
            admitted: 0,
        }
    }

    /// Returns the limit that prevents admitting another object, if any.
    pub fn check(&self) -> Option<StopReason> {
        if let Some(max_objects) = self.limits.max_objects
            && self.admitted >= max_objects
        {
            return Some(StopReason::ObjectLimit);
        }

        if let Some(max_duration) = self.limits.max_duration
            && self.started.elapsed() >= max_duration
        {
            return Some(StopReason::DurationLimit);
        }

        None
    }

    /// Counts one more admitted object.
    pub fn record(&mut self) {
        self.admitted += 1;
    }

    /// Number of objects admitted so far.
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Time since the admission clock started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
