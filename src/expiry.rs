//! Day-count arithmetic and certificate time conversions.

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};

use crate::error::ConnectionCause;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whole days between two instants, rounded to the nearest day (halves round up).
///
/// The count is symmetric and never negative: it measures elapsed time, not
/// calendar days.
pub fn days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    let millis = (a - b).num_milliseconds().abs();
    (millis + MILLIS_PER_DAY / 2) / MILLIS_PER_DAY
}

/// Days from `now` until `valid_to`, negative once `valid_to` has passed.
pub fn days_remaining(now: DateTime<Utc>, valid_to: DateTime<Utc>) -> i64 {
    let days = days_between(now, valid_to);
    if valid_to < now {
        -days
    } else {
        days
    }
}

/// Converts an ASN.1 certificate time into a UTC instant.
pub(crate) fn asn1_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, ConnectionCause> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ConnectionCause::Certificate(format!("time out of range: {}", time)))
}

/// Serde adapter writing instants as ISO-8601 UTC with milliseconds,
/// e.g. `2024-01-01T00:00:00.000Z`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(time: &DateTime<Utc>) -> String {
        time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
