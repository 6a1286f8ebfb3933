//! Utilities to deal with time: timestamps and clocks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

/// A unix timestamp (full seconds elapsed since 1970-01-01 00:00 UTC).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Creates a unix timestamp from the given number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Creates a unix timestamp from the given number of milliseconds, truncating to whole seconds.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis / 1000)
    }

    /// Creates a unix timestamp from the given system time.
    pub fn from_system(time: SystemTime) -> Self {
        let duration = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self(duration)
    }

    /// Returns the current timestamp.
    #[inline]
    pub fn now() -> Self {
        Self::from_system(SystemTime::now())
    }

    /// Returns the number of seconds since the UNIX epoch start.
    pub fn as_secs(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnixTimestamp({})", self.as_secs())
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_secs())
    }
}

impl std::ops::Sub for UnixTimestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_secs(self.0.saturating_sub(rhs.0))
    }
}

/// An error returned from parsing [`UnixTimestamp`].
#[derive(Debug)]
pub struct ParseUnixTimestampError(());

impl fmt::Display for ParseUnixTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid unix timestamp")
    }
}

impl std::error::Error for ParseUnixTimestampError {}

impl std::str::FromStr for UnixTimestamp {
    type Err = ParseUnixTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ts = s.parse().or(Err(ParseUnixTimestampError(())))?;
        Ok(Self(ts))
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.as_secs())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Self::from_secs(secs))
    }
}

/// A source of time for metrics and reporters.
///
/// Two readings are provided: a monotonic tick used to measure elapsed time, and the wall clock
/// used to timestamp reported points. Both are plain integers so that tests can drive them with
/// a [`ManualClock`].
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current monotonic time in nanoseconds.
    ///
    /// The value only has meaning relative to other ticks of the same clock.
    fn tick(&self) -> u64;

    /// Returns the current wall clock time in milliseconds since the UNIX epoch.
    fn time(&self) -> u64;

    /// Returns the current wall clock time as a [`UnixTimestamp`].
    fn timestamp(&self) -> UnixTimestamp {
        UnixTimestamp::from_millis(self.time())
    }
}

/// The default [`Clock`] backed by [`Instant`] and [`SystemTime`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Returns a shared system clock.
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn time(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Ticks and wall clock time advance together through [`advance`](Self::advance).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tally_common::{Clock, ManualClock};
///
/// let clock = ManualClock::at_millis(60_000);
/// clock.advance(Duration::from_secs(5));
///
/// assert_eq!(clock.time(), 65_000);
/// assert_eq!(clock.tick(), 5_000_000_000);
/// assert_eq!(clock.timestamp().as_secs(), 65);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    tick: AtomicU64,
    time: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock with the wall clock at the given milliseconds since the epoch.
    pub fn at_millis(millis: u64) -> Self {
        Self {
            tick: AtomicU64::new(0),
            time: AtomicU64::new(millis),
        }
    }

    /// Moves both the tick and the wall clock forward.
    pub fn advance(&self, duration: Duration) {
        self.tick
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
        self.time
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    fn time(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }
}
