//! Current (latest) values of points

use crate::query::is_truthy;
use crate::store::{PointKind, ReadingSource, SensorPoint, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Shown in place of a current value when a point has no readings
pub const NO_DATA: &str = "N/A";

/// An epoch-millisecond timestamp with its display forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpochTime {
    /// Unix timestamp in milliseconds
    pub epoch: i64,
    /// RFC 3339, UTC
    pub time: String,
    /// `MM/DD/YYYY HH:MM:SS`, UTC
    pub fmttime: String,
}

/// Format an epoch-millisecond timestamp; `None` when out of range
pub fn format_epoch(ms: i64) -> Option<EpochTime> {
    let t: DateTime<Utc> = DateTime::from_timestamp_millis(ms)?;
    Some(EpochTime {
        epoch: ms,
        time: t.to_rfc3339(),
        fmttime: t.format("%m/%d/%Y %H:%M:%S").to_string(),
    })
}

/// Latest value of a point
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CurrentReading {
    Bool(bool),
    Text(String),
}

impl std::fmt::Display for CurrentReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrentReading::Bool(b) => write!(f, "{}", b),
            CurrentReading::Text(s) => write!(f, "{}", s.replace(['{', '}'], "")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentValue {
    pub value: CurrentReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub time: EpochTime,
}

impl std::fmt::Display for CurrentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)?;
        if let Some(unit) = &self.unit {
            write!(f, " {}", unit)?;
        }
        write!(f, " as of {}", self.time.fmttime)
    }
}

/// Most recent value of a point.
///
/// `Ok(None)` means the topic has no readings, which is a normal state for
/// points without recent telemetry.
pub fn latest<S: ReadingSource + ?Sized>(
    source: &S,
    point: &SensorPoint,
) -> StoreResult<Option<CurrentValue>> {
    tracing::info!(
        "latest: for point = {} topic = {}",
        point.entity_id,
        point.topic
    );

    let Some(reading) = source.latest_reading(&point.topic)? else {
        return Ok(None);
    };
    let Some(time) = format_epoch(reading.ts) else {
        tracing::warn!("latest: {} has an out of range timestamp {}", point.topic, reading.ts);
        return Ok(None);
    };

    let text = reading
        .string_value
        .clone()
        .or_else(|| reading.double_value.map(|v| v.to_string()))
        .unwrap_or_default();

    if point.kind == PointKind::Bool {
        return Ok(Some(CurrentValue {
            value: CurrentReading::Bool(is_truthy(&text)),
            unit: None,
            time,
        }));
    }

    let text = if point.is_temperature() {
        match text.trim().parse::<f64>() {
            Ok(v) => format!("{:.1}", v),
            Err(_) => text,
        }
    } else {
        text
    };

    Ok(Some(CurrentValue {
        value: CurrentReading::Text(text),
        unit: point.unit.clone().filter(|u| !u.is_empty()),
        time,
    }))
}

/// A point paired with its current value
#[derive(Debug, Clone, Serialize)]
pub struct PointSummary {
    pub point: SensorPoint,
    pub current_value: Option<CurrentValue>,
}

impl PointSummary {
    /// Display form of the current value, `N/A` when there is none
    pub fn current_display(&self) -> String {
        match &self.current_value {
            Some(cv) => cv.to_string(),
            None => NO_DATA.to_string(),
        }
    }
}

/// Attach the current value to each point, reusing one connection
pub fn add_current_values<S: ReadingSource + ?Sized>(
    source: &S,
    points: Vec<SensorPoint>,
) -> StoreResult<Vec<PointSummary>> {
    points
        .into_iter()
        .map(|point| {
            let current_value = latest(source, &point)?;
            Ok(PointSummary {
                point,
                current_value,
            })
        })
        .collect()
}
