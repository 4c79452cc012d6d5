//! Aggregation query shapes
//!
//! A point's [`PointKind`] picks one of three query shapes. The same
//! [`QueryShape`] value renders the SQL and decodes the rows it returns, so
//! construction and decoding cannot disagree about the kind.
//!
//! ```text
//! Number  -> (bucket, NULL,              AGG(double_value))  grouped
//! Bool    -> (bucket, MIN(string_value), AGG(double_value))  grouped
//! String  -> (ts,     string_value,      double_value)       raw
//! ```
//!
//! All shapes filter `topic = ?1 AND ts > ?2 AND ts <= ?3` and return rows
//! newest first.

use crate::query::error::{QueryError, QueryResult};
use crate::store::{PointKind, SeriesRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Truncation granularity for grouped queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Hour,
    #[default]
    Minute,
    Second,
}

impl Granularity {
    /// Parse a granularity name; anything unknown falls back to `Minute`
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "day" => Granularity::Day,
            "hour" => Granularity::Hour,
            "minute" => Granularity::Minute,
            "second" => Granularity::Second,
            other => {
                tracing::debug!("Unknown granularity '{}', using minute", other);
                Granularity::default()
            }
        }
    }

    /// Bucket width in milliseconds
    pub fn millis(&self) -> i64 {
        match self {
            Granularity::Day => 86_400_000,
            Granularity::Hour => 3_600_000,
            Granularity::Minute => 60_000,
            Granularity::Second => 1_000,
        }
    }

    /// Truncate an epoch-millisecond timestamp to the start of its bucket
    pub fn truncate(&self, ts: i64) -> i64 {
        ts.div_euclid(self.millis()) * self.millis()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Hour => "hour",
            Granularity::Minute => "minute",
            Granularity::Second => "second",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregation applied over the numeric column of a bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFn {
    #[default]
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl AggregationFn {
    /// Parse an aggregation name (case-insensitive)
    pub fn parse(s: &str) -> QueryResult<Self> {
        match s.to_lowercase().as_str() {
            "avg" | "average" => Ok(AggregationFn::Avg),
            "sum" => Ok(AggregationFn::Sum),
            "min" => Ok(AggregationFn::Min),
            "max" => Ok(AggregationFn::Max),
            "count" => Ok(AggregationFn::Count),
            _ => Err(QueryError::InvalidAggregation(format!(
                "{}. Use avg, sum, min, max or count",
                s
            ))),
        }
    }

    /// SQL function name
    pub fn sql(&self) -> &'static str {
        match self {
            AggregationFn::Avg => "AVG",
            AggregationFn::Sum => "SUM",
            AggregationFn::Min => "MIN",
            AggregationFn::Max => "MAX",
            AggregationFn::Count => "COUNT",
        }
    }
}

impl std::str::FromStr for AggregationFn {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for AggregationFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql().to_lowercase())
    }
}

/// Query shape selected from a point kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Numeric points: one aggregated number per bucket
    Numeric {
        granularity: Granularity,
        aggregation: AggregationFn,
    },
    /// Boolean points: representative state plus aggregated numeric shadow
    Boolean {
        granularity: Granularity,
        aggregation: AggregationFn,
    },
    /// Everything else: raw samples, no aggregation
    Raw,
}

impl QueryShape {
    pub fn build(kind: PointKind, granularity: Granularity, aggregation: AggregationFn) -> Self {
        match kind {
            PointKind::Number => QueryShape::Numeric {
                granularity,
                aggregation,
            },
            PointKind::Bool => QueryShape::Boolean {
                granularity,
                aggregation,
            },
            PointKind::String => QueryShape::Raw,
        }
    }

    /// Render the parameterised statement (`?1` topic, `?2` start, `?3` end).
    ///
    /// Buckets floor like [`Granularity::truncate`], including before 1970.
    pub fn sql(&self) -> String {
        match self {
            QueryShape::Numeric {
                granularity,
                aggregation,
            } => format!(
                "SELECT ts - ((ts % {ms}) + {ms}) % {ms} AS timest, NULL, {agg}(double_value) FROM data
                 WHERE topic = ?1 AND ts > ?2 AND ts <= ?3
                 GROUP BY timest ORDER BY timest DESC",
                ms = granularity.millis(),
                agg = aggregation.sql()
            ),
            QueryShape::Boolean {
                granularity,
                aggregation,
            } => format!(
                "SELECT ts - ((ts % {ms}) + {ms}) % {ms} AS timest, MIN(string_value), {agg}(double_value) FROM data
                 WHERE topic = ?1 AND ts > ?2 AND ts <= ?3
                 GROUP BY timest ORDER BY timest DESC",
                ms = granularity.millis(),
                agg = aggregation.sql()
            ),
            QueryShape::Raw => "SELECT ts, string_value, double_value FROM data
                 WHERE topic = ?1 AND ts > ?2 AND ts <= ?3 ORDER BY ts DESC"
                .to_string(),
        }
    }

    /// Decode one row returned by [`QueryShape::sql`]
    pub fn decode(&self, row: SeriesRow) -> Sample {
        let value = match self {
            QueryShape::Numeric { .. } => match row.number {
                Some(n) => SampleValue::Number(n),
                None => SampleValue::Null,
            },
            QueryShape::Boolean { .. } => {
                SampleValue::Integer(decode_bool(row.text.as_deref(), row.number))
            }
            QueryShape::Raw => match row.text {
                Some(s) => SampleValue::Text(s),
                None => SampleValue::Null,
            },
        };

        Sample { ts: row.ts, value }
    }
}

/// Canonical truthiness of a stored boolean string.
///
/// Non-empty and not the literal `"0"` is on; `"t"` is the usual on value.
pub fn is_truthy(repr: &str) -> bool {
    !repr.is_empty() && repr != "0"
}

/// Decode a boolean bucket: `1` when the representative state is truthy,
/// otherwise the numeric aggregate rounded half to even (`0` when there is none).
pub fn decode_bool(repr: Option<&str>, number: Option<f64>) -> i64 {
    if repr.map(is_truthy).unwrap_or(false) {
        1
    } else {
        number.map(|n| n.round_ties_even() as i64).unwrap_or(0)
    }
}

/// Decoded sample value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Null,
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleValue::Integer(i) => write!(f, "{}", i),
            SampleValue::Number(n) => write!(f, "{}", n),
            SampleValue::Text(s) => write!(f, "{}", s),
            SampleValue::Null => Ok(()),
        }
    }
}

/// One `(timestamp, value)` pair of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in milliseconds
    pub ts: i64,
    pub value: SampleValue,
}

impl Sample {
    /// Timestamp as a UTC instant, truncated to whole seconds
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.ts.div_euclid(1000), 0)
    }
}
