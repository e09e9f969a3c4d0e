use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{DResult, Error};

/// A nanosecond-precision timestamp. Versions stamp their `created` and
/// `committed` fields with these, and the latest-attribute merge strategy
/// stores one per attribute record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NanoTime(i64);

impl NanoTime {
    pub const ZERO: NanoTime = NanoTime(0);

    /// The current wall-clock time. Saturates past the range of an i64
    /// nanosecond count (year 2262).
    pub fn now() -> NanoTime {
        NanoTime(Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX))
    }

    pub fn from_nanoseconds(ns: i64) -> NanoTime {
        NanoTime(ns)
    }

    pub fn nanoseconds(self) -> i64 {
        self.0
    }

    pub fn datetime(self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> DResult<NanoTime> {
        match dt.timestamp_nanos_opt() {
            Some(ns) => Ok(NanoTime(ns)),
            None => Err(Error::Value(format!(
                "datetime {} does not fit in nanoseconds",
                dt
            ))),
        }
    }

    /// RFC 3339 rendering with nanosecond precision, in UTC.
    pub fn rfc3339(self) -> String {
        self.datetime().to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    pub fn parse_rfc3339(s: &str) -> DResult<NanoTime> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|err| Error::Value(format!("invalid datetime {:?}: {}", s, err)))?;
        NanoTime::from_datetime(dt.with_timezone(&Utc))
    }
}

impl std::fmt::Display for NanoTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn ordering() {
        let t1 = NanoTime::now();
        let t2 = NanoTime::now();
        assert!(t2 >= t1);
        assert!(NanoTime::ZERO < t1);
    }

    #[test]
    fn datetime_roundtrip() {
        let t = NanoTime::from_nanoseconds(1_500_000_000_123_456_789);
        assert_eq!(NanoTime::from_datetime(t.datetime()).unwrap(), t);
    }

    #[test]
    fn rfc3339_roundtrip() {
        let t = NanoTime::from_nanoseconds(1_500_000_000_123_456_789);
        assert_eq!(NanoTime::parse_rfc3339(&t.rfc3339()).unwrap(), t);
        assert!(NanoTime::parse_rfc3339("not a datetime").is_err());
    }
}
