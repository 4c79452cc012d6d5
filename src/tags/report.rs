//! Tag and trending reports
//!
//! Both reports are plain header + rows tables that can be written as CSV.

use crate::store::SensorPoint;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;

/// Marker written in a report cell when a marker tag is present
pub const MARKER_CELL: &str = "X";

/// Tabular report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    /// Write the header and rows as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        csv_writer.write_record(&self.header)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Build the topic/tag matrix.
///
/// Columns are `topic` followed by every tag name seen on any related point,
/// sorted. A cell holds the key-value tag's value, `X` for a marker tag, or
/// is empty. Topics without a related point get an all-empty row.
pub fn tag_report<'a, I>(topics: I) -> Report
where
    I: IntoIterator<Item = (&'a str, Option<&'a SensorPoint>)>,
{
    let entries: Vec<(&str, Option<&SensorPoint>)> = topics.into_iter().collect();

    let columns: BTreeSet<&str> = entries
        .iter()
        .filter_map(|(_, point)| *point)
        .flat_map(|p| {
            p.kv_tags
                .keys()
                .map(String::as_str)
                .chain(p.m_tags.iter().map(String::as_str))
        })
        .collect();

    let rows = entries
        .iter()
        .map(|(topic, point)| {
            let mut row = Vec::with_capacity(columns.len() + 1);
            row.push(topic.to_string());
            for column in &columns {
                let cell = match point {
                    Some(p) => match p.kv_tags.get(*column) {
                        Some(value) => value.clone(),
                        None if p.has_marker(column) => MARKER_CELL.to_string(),
                        None => String::new(),
                    },
                    None => String::new(),
                };
                row.push(cell);
            }
            row
        })
        .collect();

    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push("topic".to_string());
    header.extend(columns.iter().map(|c| c.to_string()));

    Report { header, rows }
}

/// Build the BACnet trending report.
///
/// Columns are `Point Name`, `Volttron Point Name` (the `dis` tag) and every
/// BACnet field key in first-seen order.
pub fn trending_report(points: &[SensorPoint]) -> Report {
    let mut header = vec!["Point Name".to_string(), "Volttron Point Name".to_string()];
    for point in points {
        for key in point.bacnet_fields.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let rows = points
        .iter()
        .map(|point| {
            let mut row = vec![
                point.topic.clone(),
                point.display_name().unwrap_or_default().to_string(),
            ];
            row.extend(
                header[2..]
                    .iter()
                    .map(|key| point.bacnet_fields.get(key).cloned().unwrap_or_default()),
            );
            row
        })
        .collect();

    Report { header, rows }
}
