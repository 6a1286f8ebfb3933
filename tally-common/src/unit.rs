use std::fmt;
use std::time::Duration;

/// A unit of time used to convert rates and durations before they are reported.
///
/// Durations are recorded in nanoseconds and divided by [`to_nanos`](Self::to_nanos) of the
/// target unit. Rates are recorded per second and multiplied by [`rate_factor`](Self::rate_factor)
/// of the target unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Returns the number of nanoseconds in `amount` of this unit.
    pub fn to_nanos(self, amount: u64) -> u64 {
        amount.saturating_mul(self.nanos_per_unit())
    }

    /// Returns the number of whole seconds in `amount` of this unit.
    pub fn to_seconds(self, amount: u64) -> u64 {
        self.to_nanos(amount) / 1_000_000_000
    }

    /// Returns the length of one unit as a [`Duration`].
    pub fn as_duration(self) -> Duration {
        Duration::from_nanos(self.nanos_per_unit())
    }

    /// Returns the factor that converts a per-second rate into a rate per this unit.
    ///
    /// For units of a second and above this equals `to_seconds(1)`. Sub-second units yield the
    /// fractional number of seconds instead of truncating to zero.
    pub fn rate_factor(self) -> f64 {
        self.as_duration().as_secs_f64()
    }

    /// Converts a duration in nanoseconds into this unit.
    pub fn convert_duration(self, nanos: f64) -> f64 {
        nanos / self.nanos_per_unit() as f64
    }

    /// Converts a per-second rate into a rate per this unit.
    ///
    /// The rate is multiplied by [`rate_factor`](Self::rate_factor). For sub-second units this is
    /// a fraction of a second, so a rate of 1000 per second becomes 1 per millisecond instead of 0.
    pub fn convert_rate(self, per_second: f64) -> f64 {
        per_second * self.rate_factor()
    }

    /// Returns the canonical name of the unit.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "nanoseconds",
            Self::Microseconds => "microseconds",
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    fn nanos_per_unit(self) -> u64 {
        match self {
            Self::Nanoseconds => 1,
            Self::Microseconds => 1_000,
            Self::Milliseconds => 1_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Minutes => 60 * 1_000_000_000,
            Self::Hours => 60 * 60 * 1_000_000_000,
            Self::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned when parsing a [`TimeUnit`] from an unknown string.
#[derive(Clone, Copy, Debug)]
pub struct ParseTimeUnitError(());

impl fmt::Display for ParseTimeUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid time unit")
    }
}

impl std::error::Error for ParseTimeUnitError {}

impl std::str::FromStr for TimeUnit {
    type Err = ParseTimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "nanoseconds" | "nanosecond" | "ns" => Self::Nanoseconds,
            "microseconds" | "microsecond" | "us" => Self::Microseconds,
            "milliseconds" | "millisecond" | "ms" => Self::Milliseconds,
            "seconds" | "second" | "s" => Self::Seconds,
            "minutes" | "minute" | "m" => Self::Minutes,
            "hours" | "hour" | "h" => Self::Hours,
            "days" | "day" | "d" => Self::Days,
            _ => return Err(ParseTimeUnitError(())),
        })
    }
}

impl_str_serde!(TimeUnit, "a time unit");

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_to_nanos_and_seconds() {
        assert_eq!(TimeUnit::Milliseconds.to_nanos(1), 1_000_000);
        assert_eq!(TimeUnit::Minutes.to_seconds(1), 60);
        assert_eq!(TimeUnit::Milliseconds.to_seconds(1), 0);
        assert_eq!(TimeUnit::Days.to_seconds(2), 172_800);
    }

    #[test]
    fn test_convert_duration() {
        assert_eq!(TimeUnit::Milliseconds.convert_duration(2_500_000.0), 2.5);
        assert_eq!(TimeUnit::Seconds.convert_duration(1e9), 1.0);
    }

    #[test]
    fn test_convert_rate() {
        assert_eq!(TimeUnit::Seconds.convert_rate(2.0), 2.0);
        assert_eq!(TimeUnit::Minutes.convert_rate(2.0), 120.0);
        assert_eq!(TimeUnit::Milliseconds.convert_rate(1000.0), 1.0);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("ms".parse::<TimeUnit>().unwrap(), TimeUnit::Milliseconds);
        assert!("fortnights".parse::<TimeUnit>().is_err());

        let json = serde_json::to_string(&TimeUnit::Hours).unwrap();
        assert_eq!(json, r#""hours""#);
        let unit: TimeUnit = serde_json::from_str(r#""second""#).unwrap();
        assert_eq!(unit, TimeUnit::Seconds);
    }
}
