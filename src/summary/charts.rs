//! Chart descriptors for point lists

use super::current::{latest, CurrentValue};
use crate::store::{PointKind, ReadingSource, SensorPoint, StoreResult};
use serde::Serialize;

/// Unit label used for boolean charts
pub const BOOL_UNIT: &str = "on/off";

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    /// 1-based position among the charts that have data
    pub index: usize,
    pub title: String,
    pub unit: String,
    pub site_id: Option<String>,
    pub equipment_id: Option<String>,
    pub point_id: String,
    pub current_value: CurrentValue,
    #[serde(rename = "isBool")]
    pub is_bool: bool,
}

/// One chart per point that has data; points without readings are skipped
pub fn charts_for_points<S: ReadingSource + ?Sized>(
    source: &S,
    points: &[SensorPoint],
) -> StoreResult<Vec<ChartSpec>> {
    let mut charts = Vec::new();

    for point in points {
        let Some(current_value) = latest(source, point)? else {
            continue;
        };

        let description = point.description.clone().unwrap_or_default();
        let (title, unit) = match point.unit.as_deref().filter(|u| !u.is_empty()) {
            Some(unit) => (format!("{} {}", description, unit), unit.to_string()),
            None => (description, String::new()),
        };
        let is_bool = point.kind == PointKind::Bool;

        charts.push(ChartSpec {
            index: charts.len() + 1,
            title,
            unit: if is_bool { BOOL_UNIT.to_string() } else { unit },
            site_id: point.site_id.clone(),
            equipment_id: point.equipment_id.clone(),
            point_id: point.entity_id.clone(),
            current_value,
            is_bool,
        });
    }

    Ok(charts)
}
