//! Range tokens
//!
//! Translates the short range vocabulary used by charts and reports into an
//! absolute UTC window `(start, end]`:
//!
//! ```text
//! today | yesterday | <N> months | <N> month | <N> days | <N>h | <N>m
//! <date> | <date>,<date>
//! ```
//!
//! Suffix rules overlap (`"1 month"` also ends in `h`), so they are evaluated
//! in a fixed order and the first match wins.

use crate::query::error::{QueryError, QueryResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Range used when the caller gives none
pub const DEFAULT_RANGE: &str = "24h";

/// Days counted per month in `<N> month(s)` tokens
pub const DAYS_PER_MONTH: i64 = 30;

/// Resolved time window; `start` is always strictly before `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted ones
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> QueryResult<Self> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(QueryError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            })
        }
    }

    /// Resolve a range token relative to `now`.
    ///
    /// An empty token means [`DEFAULT_RANGE`]. Malformed tokens and date text
    /// are errors, never silently defaulted.
    pub fn resolve(token: &str, now: DateTime<Utc>) -> QueryResult<Self> {
        let token = if token.is_empty() { DEFAULT_RANGE } else { token };

        let rule = RULES
            .iter()
            .find(|rule| (rule.matches)(token))
            .unwrap_or(&EXPLICIT_RULE);

        let window = (rule.resolve)(token, now)?;
        tracing::debug!(
            "Range '{}' ({}) resolved to {} .. {}",
            token,
            rule.name,
            window.start,
            window.end
        );
        Ok(window)
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -- {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// One grammar rule: a predicate on the raw token and its resolver
struct RangeRule {
    name: &'static str,
    matches: fn(&str) -> bool,
    resolve: fn(&str, DateTime<Utc>) -> QueryResult<TimeWindow>,
}

/// Ordered rules; do not reorder
const RULES: &[RangeRule] = &[
    RangeRule {
        name: "today",
        matches: is_today,
        resolve: resolve_today,
    },
    RangeRule {
        name: "yesterday",
        matches: is_yesterday,
        resolve: resolve_yesterday,
    },
    RangeRule {
        name: "months",
        matches: is_months,
        resolve: resolve_months,
    },
    RangeRule {
        name: "month",
        matches: is_month,
        resolve: resolve_month,
    },
    RangeRule {
        name: "days",
        matches: is_days,
        resolve: resolve_days,
    },
    RangeRule {
        name: "hours",
        matches: is_hours,
        resolve: resolve_hours,
    },
    RangeRule {
        name: "minutes",
        matches: is_minutes,
        resolve: resolve_minutes,
    },
];

static EXPLICIT_RULE: RangeRule = RangeRule {
    name: "explicit",
    matches: |_| true,
    resolve: resolve_explicit,
};

fn has_suffix(token: &str, suffix: &str) -> bool {
    token.len() > suffix.len() && token.ends_with(suffix)
}

fn is_today(token: &str) -> bool {
    token == "today"
}

fn is_yesterday(token: &str) -> bool {
    token == "yesterday"
}

fn is_months(token: &str) -> bool {
    has_suffix(token, " months")
}

fn is_month(token: &str) -> bool {
    has_suffix(token, " month")
}

fn is_days(token: &str) -> bool {
    has_suffix(token, " days")
}

fn is_hours(token: &str) -> bool {
    has_suffix(token, "h")
}

fn is_minutes(token: &str) -> bool {
    has_suffix(token, "m")
}

fn resolve_today(_token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    TimeWindow::new(now - Duration::days(1), now)
}

fn resolve_yesterday(_token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    TimeWindow::new(now - Duration::days(2), now - Duration::days(1))
}

fn resolve_months(token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    let n = parse_count(token, " months")?;
    let days = n
        .checked_mul(DAYS_PER_MONTH)
        .ok_or_else(|| out_of_range(token))?;
    back_from(token, now, Duration::try_days(days))
}

fn resolve_month(token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    let n = parse_count(token, " month")?;
    let days = n
        .checked_mul(DAYS_PER_MONTH)
        .ok_or_else(|| out_of_range(token))?;
    back_from(token, now, Duration::try_days(days))
}

fn resolve_days(token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    let n = parse_count(token, " days")?;
    back_from(token, now, Duration::try_days(n))
}

fn resolve_hours(token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    let n = parse_count(token, "h")?;
    back_from(token, now, Duration::try_hours(n))
}

fn resolve_minutes(token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    let n = parse_count(token, "m")?;
    back_from(token, now, Duration::try_minutes(n))
}

/// `<date>` or `<date>,<date>`; a single date runs until `now`
fn resolve_explicit(token: &str, now: DateTime<Utc>) -> QueryResult<TimeWindow> {
    let parts: Vec<&str> = token.split(',').collect();
    if parts.len() > 2 {
        return Err(QueryError::InvalidRange {
            token: token.to_string(),
            reason: "expected <date> or <date>,<date>".to_string(),
        });
    }

    let start = parse_datetime(parts[0])?;
    let end = match parts.get(1) {
        Some(text) => parse_datetime(text)?,
        None => now,
    };
    TimeWindow::new(start, end)
}

fn parse_count(token: &str, suffix: &str) -> QueryResult<i64> {
    let prefix = &token[..token.len() - suffix.len()];
    prefix
        .trim()
        .parse::<i64>()
        .map_err(|_| QueryError::InvalidRange {
            token: token.to_string(),
            reason: format!("invalid count '{}'", prefix),
        })
}

fn back_from(token: &str, now: DateTime<Utc>, span: Option<Duration>) -> QueryResult<TimeWindow> {
    let start = span
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| out_of_range(token))?;
    TimeWindow::new(start, now)
}

fn out_of_range(token: &str) -> QueryError {
    QueryError::InvalidRange {
        token: token.to_string(),
        reason: "span out of range".to_string(),
    }
}

const ZONED_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a free-form date/time literal. Text without an offset is UTC.
pub fn parse_datetime(text: &str) -> QueryResult<DateTime<Utc>> {
    let s = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(dt.and_utc());
            }
        }
    }

    Err(QueryError::InvalidDate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_hours() {
        let w = TimeWindow::resolve("24h", now()).unwrap();
        assert_eq!(w.start, now() - Duration::hours(24));
        assert_eq!(w.end, now());
    }

    #[test]
    fn test_empty_token_defaults_to_24h() {
        let w = TimeWindow::resolve("", now()).unwrap();
        assert_eq!(w, TimeWindow::resolve("24h", now()).unwrap());
    }

    #[test]
    fn test_today_and_yesterday() {
        let today = TimeWindow::resolve("today", now()).unwrap();
        assert_eq!(today.start, now() - Duration::days(1));
        assert_eq!(today.end, now());

        let yesterday = TimeWindow::resolve("yesterday", now()).unwrap();
        assert_eq!(yesterday.start, now() - Duration::days(2));
        assert_eq!(yesterday.end, now() - Duration::days(1));
    }

    #[test]
    fn test_months_use_thirty_days() {
        let w = TimeWindow::resolve("3 months", now()).unwrap();
        assert_eq!(w.start, now() - Duration::days(90));

        let w = TimeWindow::resolve("1 month", now()).unwrap();
        assert_eq!(w.start, now() - Duration::days(30));
    }

    #[test]
    fn test_days_and_minutes() {
        let w = TimeWindow::resolve("7 days", now()).unwrap();
        assert_eq!(w.start, now() - Duration::days(7));

        let w = TimeWindow::resolve("15m", now()).unwrap();
        assert_eq!(w.start, now() - Duration::minutes(15));
    }

    #[test]
    fn test_month_is_not_taken_as_hours() {
        // "2 month" ends in 'h' but must resolve as months
        let w = TimeWindow::resolve("2 month", now()).unwrap();
        assert_eq!(w.start, now() - Duration::days(60));
    }

    #[test]
    fn test_minutes_suffix_is_not_months() {
        let w = TimeWindow::resolve("90m", now()).unwrap();
        assert_eq!(w.duration(), Duration::minutes(90));
    }

    #[test]
    fn test_invalid_count_is_an_error() {
        let err = TimeWindow::resolve("abch", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));

        let err = TimeWindow::resolve("x months", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));
    }

    #[test]
    fn test_zero_or_negative_count_rejected() {
        assert!(matches!(
            TimeWindow::resolve("0h", now()),
            Err(QueryError::InvalidTimeRange { .. })
        ));
        assert!(matches!(
            TimeWindow::resolve("-2 days", now()),
            Err(QueryError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn test_huge_count_rejected() {
        let err = TimeWindow::resolve("9223372036854775807 months", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));
    }

    #[test]
    fn test_explicit_single_date() {
        let w = TimeWindow::resolve("2024-03-01", now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end, now());
    }

    #[test]
    fn test_explicit_date_pair() {
        let w = TimeWindow::resolve("2024-03-01 08:00:00, 2024-03-02T08:00:00Z", now()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_explicit_offset_is_converted_to_utc() {
        let w = TimeWindow::resolve("2024-03-01T10:00:00+02:00,2024-03-01T12:00:00+02:00", now())
            .unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_malformed_date_fails_loudly() {
        let err = TimeWindow::resolve("next tuesday", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidDate(_)));

        let err = TimeWindow::resolve("2024-03-01,garbage", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidDate(_)));
    }

    #[test]
    fn test_inverted_explicit_pair_rejected() {
        let err = TimeWindow::resolve("2024-03-02,2024-03-01", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTimeRange { .. }));
    }

    #[test]
    fn test_too_many_segments_rejected() {
        let err = TimeWindow::resolve("2024-03-01,2024-03-02,2024-03-03", now()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidRange { .. }));
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 0).unwrap();
        assert_eq!(parse_datetime("03/01/2024 14:05").unwrap(), expected);
        assert_eq!(parse_datetime("2024-03-01 14:05").unwrap(), expected);
        assert_eq!(parse_datetime(" 2024-03-01T14:05:00 ").unwrap(), expected);
    }

    #[test]
    fn test_supported_tokens_yield_ordered_windows() {
        for token in ["", "today", "yesterday", "2 months", "1 month", "3 days", "6h", "30m"] {
            let w = TimeWindow::resolve(token, now()).unwrap();
            assert!(w.start < w.end, "token {:?}", token);
        }
    }
}
