//! Point value queries
//!
//! Resolves the range token, builds the query shape for the point's kind,
//! runs it against a [`ReadingSource`] and returns a chronological series.

use crate::query::aggregation::{AggregationFn, Granularity, QueryShape, Sample};
use crate::query::error::QueryResult;
use crate::query::range::{TimeWindow, DEFAULT_RANGE};
use crate::store::{ReadingSource, SensorPoint};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Parameters for a point value query
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesRequest {
    /// Range token, see [`TimeWindow::resolve`]
    pub range: String,
    pub granularity: Granularity,
    pub aggregation: AggregationFn,
}

impl Default for ValuesRequest {
    fn default() -> Self {
        Self {
            range: DEFAULT_RANGE.to_string(),
            granularity: Granularity::default(),
            aggregation: AggregationFn::default(),
        }
    }
}

impl ValuesRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, token: impl Into<String>) -> Self {
        self.range = token.into();
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn aggregation(mut self, aggregation: AggregationFn) -> Self {
        self.aggregation = aggregation;
        self
    }
}

/// Chronological samples for one point over a resolved window
#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub entity_id: String,
    pub topic: String,
    pub window: TimeWindow,
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

impl IntoIterator for Series {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Query a point's values relative to `now`.
///
/// Rows come back newest first from the store; the returned series is
/// oldest first. Running the same request again re-reads the store.
pub fn point_values<S: ReadingSource + ?Sized>(
    source: &S,
    point: &SensorPoint,
    request: &ValuesRequest,
    now: DateTime<Utc>,
) -> QueryResult<Series> {
    let window = TimeWindow::resolve(&request.range, now)?;
    tracing::info!("Getting data points for range {}", window);

    let shape = QueryShape::build(point.kind, request.granularity, request.aggregation);
    let rows = source.fetch_rows(
        &shape.sql(),
        &point.topic,
        window.start_millis(),
        window.end_millis(),
    )?;

    let mut samples: Vec<Sample> = rows.into_iter().map(|row| shape.decode(row)).collect();
    samples.reverse();

    tracing::info!("Got {} data points for {}", samples.len(), point.entity_id);

    Ok(Series {
        entity_id: point.entity_id.clone(),
        topic: point.topic.clone(),
        window,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::aggregation::SampleValue;
    use crate::query::error::QueryError;
    use crate::store::{PointKind, Reading, TimeSeriesConnection};
    use chrono::TimeZone;

    const MINUTE: i64 = 60_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn minutes_ago(n: i64) -> i64 {
        now().timestamp_millis() - n * MINUTE
    }

    #[test]
    fn test_numeric_average_per_minute() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        let base = minutes_ago(10);
        conn.insert_readings(&[
            Reading::number("ahu/sat", base + 1_000, 50.0),
            Reading::number("ahu/sat", base + 2_000, 52.0),
            Reading::number("ahu/sat", base + MINUTE + 1_000, 60.0),
        ])
        .unwrap();

        let point = SensorPoint::new("sat", "ahu/sat", PointKind::Number);
        let series = point_values(&conn, &point, &ValuesRequest::new(), now()).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.samples[0].ts, Granularity::Minute.truncate(base + 1_000));
        assert_eq!(series.samples[0].value, SampleValue::Number(51.0));
        assert_eq!(series.samples[1].value, SampleValue::Number(60.0));
    }

    #[test]
    fn test_result_is_chronological() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        let readings: Vec<Reading> = (1..=30)
            .map(|i| Reading::number("t", minutes_ago(i * 3), i as f64))
            .collect();
        conn.insert_readings(&readings).unwrap();

        let point = SensorPoint::new("p", "t", PointKind::Number);
        let series = point_values(&conn, &point, &ValuesRequest::new().range("2h"), now()).unwrap();

        assert_eq!(series.len(), 30);
        assert!(series.samples.windows(2).all(|w| w[0].ts < w[1].ts));
    }

    #[test]
    fn test_window_bounds_exclusive_start_inclusive_end() {
        let conn = TimeSeriesConnection::open_in_memory().unwrap();
        let now_ms = now().timestamp_millis();
        conn.insert_reading(&Reading::text("s", now_ms - 3_600_000, "start")).unwrap();
        conn.insert_reading(&Reading::text("s", now_ms, "end")).unwrap();
        conn.insert_reading(&Reading::text("s", now_ms + 1, "future")).unwrap();

        let point = SensorPoint::new("p", "s", PointKind::String);
        let series = point_values(&conn, &point, &ValuesRequest::new().range("1h"), now()).unwrap();

        let values: Vec<SampleValue> = series.into_iter().map(|s| s.value).collect();
        assert_eq!(values, vec![SampleValue::Text("end".to_string())]);
    }

    #[test]
    fn test_bool_points_are_normalised() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        conn.insert_readings(&[
            Reading::flag("fan", minutes_ago(5), true),
            Reading::flag("fan", minutes_ago(3), false),
        ])
        .unwrap();

        let point = SensorPoint::new("p", "fan", PointKind::Bool);
        let series = point_values(&conn, &point, &ValuesRequest::new(), now()).unwrap();

        let values: Vec<&SampleValue> = series.iter().map(|s| &s.value).collect();
        assert_eq!(
            values,
            vec![&SampleValue::Integer(1), &SampleValue::Integer(0)]
        );
    }

    #[test]
    fn test_bool_bucket_split_evenly_is_off() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        let base = minutes_ago(5);
        conn.insert_readings(&[
            Reading::flag("fan", base + 1_000, true),
            Reading::flag("fan", base + 2_000, false),
        ])
        .unwrap();

        let point = SensorPoint::new("p", "fan", PointKind::Bool);
        let series = point_values(&conn, &point, &ValuesRequest::new(), now()).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.samples[0].value, SampleValue::Integer(0));
    }

    #[test]
    fn test_buckets_floor_before_epoch() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        conn.insert_readings(&[
            Reading::number("old", -30_500, 4.0),
            Reading::number("old", -1_000, 6.0),
        ])
        .unwrap();

        let point = SensorPoint::new("p", "old", PointKind::Number);
        let request = ValuesRequest::new().range("1969-12-31T23:00:00Z,1970-01-01T00:00:00Z");
        let series = point_values(&conn, &point, &request, now()).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.samples[0].ts, Granularity::Minute.truncate(-30_500));
        assert_eq!(series.samples[0].ts, -60_000);
        assert_eq!(series.samples[0].value, SampleValue::Number(5.0));
    }

    #[test]
    fn test_string_points_are_not_aggregated() {
        let mut conn = TimeSeriesConnection::open_in_memory().unwrap();
        let base = minutes_ago(5);
        conn.insert_readings(&[
            Reading::text("mode", base + 1_000, "heating"),
            Reading::text("mode", base + 2_000, "cooling"),
        ])
        .unwrap();

        let point = SensorPoint::new("p", "mode", PointKind::String);
        let request = ValuesRequest::new().granularity(Granularity::Hour);
        let series = point_values(&conn, &point, &request, now()).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.samples[1].value, SampleValue::Text("cooling".to_string()));
    }

    #[test]
    fn test_empty_range_is_empty_series() {
        let conn = TimeSeriesConnection::open_in_memory().unwrap();
        let point = SensorPoint::new("p", "nothing", PointKind::Number);
        let series = point_values(&conn, &point, &ValuesRequest::new().range(""), now()).unwrap();

        assert!(series.is_empty());
        assert_eq!(series.window.duration(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_malformed_range_propagates() {
        let conn = TimeSeriesConnection::open_in_memory().unwrap();
        let point = SensorPoint::new("p", "t", PointKind::Number);
        let err = point_values(&conn, &point, &ValuesRequest::new().range("soon"), now())
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidDate(_)));
    }

    #[test]
    fn test_rerun_is_repeatable() {
        let conn = TimeSeriesConnection::open_in_memory().unwrap();
        conn.insert_reading(&Reading::number("t", minutes_ago(2), 1.0)).unwrap();
        let point = SensorPoint::new("p", "t", PointKind::Number);
        let request = ValuesRequest::new();

        let first = point_values(&conn, &point, &request, now()).unwrap();
        let second = point_values(&conn, &point, &request, now()).unwrap();
        assert_eq!(first.samples, second.samples);
    }
}
