//! Per-equipment summaries

use super::current::{add_current_values, PointSummary};
use crate::store::{MetadataSource, ReadingSource, SensorPoint, StoreResult};
use crate::tags::{ahu_key_metrics, match_all, resolve_roles, RoleCatalog};
use serde::Serialize;

/// The point chosen for a role and its current value
#[derive(Debug, Clone, Serialize)]
pub struct RoleValue {
    pub role: String,
    /// Number of points that qualified for the role
    pub candidates: usize,
    #[serde(flatten)]
    pub summary: PointSummary,
}

/// Current values of the key metrics of an equipment, in catalog order
pub fn equipment_current_values<M, R>(
    meta: &M,
    readings: &R,
    equipment_id: &str,
    catalog: &RoleCatalog,
) -> StoreResult<Vec<RoleValue>>
where
    M: MetadataSource + ?Sized,
    R: ReadingSource + ?Sized,
{
    let points = meta.points_for_equipment(equipment_id)?;
    let resolution = resolve_roles(&points, catalog);

    let mut values = Vec::with_capacity(resolution.len());
    for m in resolution.iter() {
        let summary = add_current_values(readings, vec![m.selected.clone()])?
            .into_iter()
            .next();
        if let Some(summary) = summary {
            values.push(RoleValue {
                role: m.role.clone(),
                candidates: m.candidates.len(),
                summary,
            });
        }
    }

    tracing::info!(
        "Resolved {} of {} roles for equipment {}",
        values.len(),
        catalog.len(),
        equipment_id
    );
    Ok(values)
}

/// Current values of an air handling unit's key metrics
pub fn ahu_current_values<M, R>(
    meta: &M,
    readings: &R,
    equipment_id: &str,
) -> StoreResult<Vec<RoleValue>>
where
    M: MetadataSource + ?Sized,
    R: ReadingSource + ?Sized,
{
    equipment_current_values(meta, readings, equipment_id, &ahu_key_metrics())
}

/// A metric and the topic that feeds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricTopic {
    pub metric: String,
    pub topic: String,
}

/// Every matching `(metric, topic)` pair, without tie-breaking
pub fn equipment_metrics(points: &[SensorPoint], catalog: &RoleCatalog) -> Vec<MetricTopic> {
    match_all(points, catalog)
        .into_iter()
        .map(|(metric, point)| MetricTopic {
            metric: metric.to_string(),
            topic: point.topic.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MetadataConnection, PointKind, Reading, TimeSeriesConnection};
    use crate::summary::current::CurrentReading;
    use crate::tags::equipment_dashboard_metrics;

    fn ahu_points() -> Vec<SensorPoint> {
        vec![
            SensorPoint::new("ahu1-rat", "ahu1/rat", PointKind::Number)
                .equipment("ahu1")
                .unit("°F")
                .markers(&["air", "his", "point", "sensor", "temp", "return"]),
            SensorPoint::new("ahu1-sat", "ahu1/sat", PointKind::Number)
                .equipment("ahu1")
                .unit("°F")
                .markers(&["air", "his", "point", "sensor", "temp"]),
            SensorPoint::new("ahu1-clg", "ahu1/clg", PointKind::Bool)
                .equipment("ahu1")
                .markers(&["his", "point", "sensor", "cooling"]),
            SensorPoint::new("ahu2-sat", "ahu2/sat", PointKind::Number)
                .equipment("ahu2")
                .markers(&["air", "his", "point", "sensor", "temp"]),
        ]
    }

    #[test]
    fn test_ahu_current_values() {
        let meta = MetadataConnection::open_in_memory().unwrap();
        for p in ahu_points() {
            meta.save_point(&p).unwrap();
        }
        let ts = TimeSeriesConnection::open_in_memory().unwrap();
        ts.insert_reading(&Reading::number("ahu1/sat", 1_000, 55.04)).unwrap();
        ts.insert_reading(&Reading::number("ahu1/rat", 1_000, 71.0)).unwrap();

        let values = ahu_current_values(&meta, &ts, "ahu1").unwrap();
        let roles: Vec<&str> = values.iter().map(|v| v.role.as_str()).collect();
        assert_eq!(roles, vec!["Space Air Temp", "Return Air Temp", "Cooling"]);

        let space = &values[0];
        assert_eq!(space.summary.point.entity_id, "ahu1-sat");
        assert_eq!(
            space.summary.current_value.as_ref().unwrap().value,
            CurrentReading::Text("55.0".to_string())
        );

        // cooling has a point but no readings
        assert!(values[2].summary.current_value.is_none());
    }

    #[test]
    fn test_unknown_equipment_is_empty() {
        let meta = MetadataConnection::open_in_memory().unwrap();
        let ts = TimeSeriesConnection::open_in_memory().unwrap();
        assert!(ahu_current_values(&meta, &ts, "nope").unwrap().is_empty());
    }

    #[test]
    fn test_equipment_metrics_lists_every_match() {
        let points = vec![
            SensorPoint::new("z1", "vav1/zt", PointKind::Number)
                .markers(&["temp", "zone", "air", "his", "point"]),
            SensorPoint::new("z2", "vav1/zt2", PointKind::Number)
                .markers(&["temp", "zone", "air", "his", "point", "sensor"]),
            SensorPoint::new("sp", "vav1/ztsp", PointKind::Number)
                .markers(&["temp", "zone", "air", "sp", "his", "point"]),
        ];

        let metrics = equipment_metrics(&points, &equipment_dashboard_metrics());
        assert_eq!(
            metrics,
            vec![
                MetricTopic { metric: "ZoneTemp".into(), topic: "vav1/zt".into() },
                MetricTopic { metric: "ZoneTemp".into(), topic: "vav1/zt2".into() },
                MetricTopic { metric: "ZoneTempSP".into(), topic: "vav1/ztsp".into() },
            ]
        );
    }
}
