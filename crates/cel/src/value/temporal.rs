//! `Duration` and `Timestamp`: nanosecond-precision temporal values.
//!
//! Both are newtypes over `i64` nanoseconds -- the internal representation
//! is integer nanoseconds; `chrono` is used only as a
//! calendar calculator for parsing, formatting, and the timezone-aware
//! accessors, never as the storage representation — the teacher crate makes
//! the same choice for its own scalar types (`value.rs` keeps `Int`/`Float`
//! inline and reaches for a helper crate only when the math is nontrivial).

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{EvalError, EvalErrorKind};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Signed nanosecond duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub i64);

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-?(\d+h)?(\d+m)?(\d+s)?(\d+ms)?(\d+us)?(\d+ns)?$").expect("duration grammar is valid")
    })
}

impl Duration {
    /// Parses the grammar `^-?(\d+h)?(\d+m)?(\d+s)?(\d+ms)?(\d+us)?(\d+ns)?$`.
    pub fn parse(text: &str) -> Result<Self, EvalError> {
        let negative = text.starts_with('-');
        if !duration_regex().is_match(text) || text == "-" || text.is_empty() {
            return Err(EvalError::new(EvalErrorKind::InvalidArgument));
        }
        let body = text.strip_prefix('-').unwrap_or(text);
        if body.is_empty() {
            return Err(EvalError::new(EvalErrorKind::InvalidArgument));
        }
        let mut total: i64 = 0;
        let mut rest = body;
        for (suffix, scale) in [
            ("h", 3_600 * NANOS_PER_SEC),
            ("m", 60 * NANOS_PER_SEC),
            ("s", NANOS_PER_SEC),
            ("ms", 1_000_000),
            ("us", 1_000),
            ("ns", 1),
        ] {
            if let Some(idx) = find_unit(rest, suffix) {
                let (digits, remainder) = rest.split_at(idx);
                let value: i64 = digits.parse().map_err(|_| EvalError::new(EvalErrorKind::InvalidArgument))?;
                let scaled = value.checked_mul(scale).ok_or_else(|| EvalError::new(EvalErrorKind::Overflow))?;
                total = total.checked_add(scaled).ok_or_else(|| EvalError::new(EvalErrorKind::Overflow))?;
                rest = &remainder[suffix.len()..];
            }
        }
        if !rest.is_empty() {
            return Err(EvalError::new(EvalErrorKind::InvalidArgument));
        }
        if negative {
            total = total.checked_neg().ok_or_else(|| EvalError::new(EvalErrorKind::Overflow))?;
        }
        Ok(Self(total))
    }

    #[must_use]
    pub fn nanos(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    #[must_use]
    pub fn hours(self) -> i64 {
        self.0 / (3_600 * NANOS_PER_SEC)
    }

    #[must_use]
    pub fn minutes(self) -> i64 {
        self.0 / (60 * NANOS_PER_SEC)
    }

    #[must_use]
    pub fn seconds(self) -> i64 {
        self.0 / NANOS_PER_SEC
    }

    #[must_use]
    pub fn milliseconds(self) -> i64 {
        self.0 / 1_000_000
    }
}

/// Finds the index right after the longest leading run of ASCII digits that
/// is immediately followed by `suffix`, scanning from the front of `rest`.
fn find_unit(rest: &str, suffix: &str) -> Option<usize> {
    let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digit_end == 0 {
        return None;
    }
    if rest[digit_end..].starts_with(suffix) {
        Some(digit_end)
    } else {
        None
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let nanos = self.0.unsigned_abs();
        let whole = nanos / NANOS_PER_SEC as u64;
        let frac = nanos % NANOS_PER_SEC as u64;
        if frac == 0 {
            write!(f, "{sign}{whole}s")
        } else {
            write!(f, "{sign}{whole}.{frac:09}s")
        }
    }
}

/// Nanoseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Parses an RFC3339 timestamp.
    pub fn parse(text: &str) -> Result<Self, EvalError> {
        let parsed = DateTime::parse_from_rfc3339(text).map_err(|_| EvalError::new(EvalErrorKind::InvalidArgument))?;
        Self::from_datetime(parsed.with_timezone(&Utc))
    }

    fn from_datetime(dt: DateTime<Utc>) -> Result<Self, EvalError> {
        let nanos = dt.timestamp_nanos_opt().ok_or_else(|| EvalError::new(EvalErrorKind::Overflow))?;
        Ok(Self(nanos))
    }

    #[must_use]
    pub fn nanos(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, rhs: Duration) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Duration) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_diff(self, rhs: Self) -> Option<Duration> {
        self.0.checked_sub(rhs.0).map(Duration)
    }

    fn at_timezone(self, tz: &str) -> Result<DateTime<FixedOffset>, EvalError> {
        let utc = Utc.timestamp_nanos(self.0);
        if tz.eq_ignore_ascii_case("UTC") || tz.is_empty() {
            return Ok(utc.with_timezone(&FixedOffset::east_opt(0).expect("zero offset is valid")));
        }
        let offset = parse_fixed_offset(tz).ok_or_else(|| EvalError::new(EvalErrorKind::InvalidArgument))?;
        Ok(utc.with_timezone(&offset))
    }

    pub fn get_full_year(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.year()))
    }

    pub fn get_month(self, tz: &str) -> Result<i64, EvalError> {
        // CEL months are zero-based (January == 0), matching the original implementation.
        Ok(i64::from(self.at_timezone(tz)?.month0()))
    }

    pub fn get_day_of_year(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.ordinal0()))
    }

    pub fn get_day_of_month(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.day0()))
    }

    pub fn get_date(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.day()))
    }

    pub fn get_day_of_week(self, tz: &str) -> Result<i64, EvalError> {
        // Sunday == 0, matching the original implementation's convention.
        Ok(i64::from(self.at_timezone(tz)?.weekday().num_days_from_sunday()))
    }

    pub fn get_hours(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.hour()))
    }

    pub fn get_minutes(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.minute()))
    }

    pub fn get_seconds(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.second()))
    }

    pub fn get_milliseconds(self, tz: &str) -> Result<i64, EvalError> {
        Ok(i64::from(self.at_timezone(tz)?.timestamp_subsec_millis()))
    }
}

/// Parses a fixed UTC offset of the form `+HH:MM` / `-HH:MM`.
///
/// This crate supports `UTC` and fixed offsets rather than the full IANA
/// tzdata database; named zones (`"America/Los_Angeles"`) would need a
/// `chrono-tz`-style dependency the teacher's stack does not carry, so this
/// is a documented scope cut (see `DESIGN.md`).
fn parse_fixed_offset(tz: &str) -> Option<FixedOffset> {
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let mut parts = rest.split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next().unwrap_or("0").parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let total_seconds = sign * (hours * 3600 + minutes * 60);
    FixedOffset::east_opt(total_seconds)
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let utc = Utc.timestamp_nanos(self.0);
        write!(f, "{}", utc.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
    }
}
