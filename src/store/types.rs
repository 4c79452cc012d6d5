//! Core data types for points and readings
//!
//! - `SensorPoint`: a monitored channel with its semantic tags
//! - `PointKind`: value type of a point, drives query shape and decoding
//! - `Reading`: one stored sample for a topic
//! - `SeriesRow`: one row returned by an aggregation query

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value type of a sensor point
///
/// Anything that is not `Number` or `Bool` is treated as a string point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum PointKind {
    Number,
    Bool,
    #[default]
    String,
}

impl PointKind {
    /// Parse a kind as stored in metadata ("Number", "Bool", anything else)
    pub fn parse(s: &str) -> Self {
        match s {
            "Number" => PointKind::Number,
            "Bool" => PointKind::Bool,
            _ => PointKind::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointKind::Number => "Number",
            PointKind::Bool => "Bool",
            PointKind::String => "Str",
        }
    }
}

impl From<String> for PointKind {
    fn from(s: String) -> Self {
        PointKind::parse(&s)
    }
}

impl From<PointKind> for String {
    fn from(kind: PointKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for PointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Units that get one-decimal rounding on display
pub const TEMPERATURE_UNITS: &[&str] = &["°F", "°C"];

/// A monitored data channel with semantic tags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorPoint {
    /// Stable metadata identifier
    pub entity_id: String,
    /// Time-series channel key
    pub topic: String,
    #[serde(default)]
    pub kind: PointKind,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    /// Marker tags
    #[serde(default)]
    pub m_tags: BTreeSet<String>,
    /// Key-value tags
    #[serde(default)]
    pub kv_tags: BTreeMap<String, String>,
    /// Fields imported from the BACnet trending configuration
    #[serde(default)]
    pub bacnet_fields: BTreeMap<String, String>,
}

impl SensorPoint {
    /// Create a point with no tags
    pub fn new(entity_id: impl Into<String>, topic: impl Into<String>, kind: PointKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            topic: topic.into(),
            kind,
            unit: None,
            description: None,
            equipment_id: None,
            site_id: None,
            m_tags: BTreeSet::new(),
            kv_tags: BTreeMap::new(),
            bacnet_fields: BTreeMap::new(),
        }
    }

    /// Builder: set unit
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Builder: set description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Builder: set owning equipment
    pub fn equipment(mut self, equipment_id: impl Into<String>) -> Self {
        self.equipment_id = Some(equipment_id.into());
        self
    }

    /// Builder: set owning site
    pub fn site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Builder: add marker tags
    pub fn markers(mut self, tags: &[&str]) -> Self {
        self.m_tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    /// Builder: add a key-value tag
    pub fn kv(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kv_tags.insert(key.into(), value.into());
        self
    }

    /// Builder: add a BACnet field
    pub fn bacnet_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bacnet_fields.insert(key.into(), value.into());
        self
    }

    /// Add a tag: a marker when `value` is `None`, a key-value tag otherwise.
    ///
    /// The `kind` and `unit` tags also update the typed fields.
    pub fn add_tag(&mut self, tag: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                match tag {
                    "kind" => self.kind = PointKind::parse(v),
                    "unit" => self.unit = Some(v.to_string()),
                    _ => {}
                }
                self.kv_tags.insert(tag.to_string(), v.to_string());
            }
            None => {
                self.m_tags.insert(tag.to_string());
            }
        }
    }

    pub fn has_marker(&self, tag: &str) -> bool {
        self.m_tags.contains(tag)
    }

    /// Display name (`dis` tag)
    pub fn display_name(&self) -> Option<&str> {
        self.kv_tags.get("dis").map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Related model (`modelRef` tag)
    pub fn model_ref(&self) -> Option<&str> {
        self.kv_tags
            .get("modelRef")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn is_temperature(&self) -> bool {
        self.kind == PointKind::Number
            && self
                .unit
                .as_deref()
                .map(|u| TEMPERATURE_UNITS.contains(&u))
                .unwrap_or(false)
    }
}

/// One stored sample for a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub topic: String,
    /// Unix timestamp in milliseconds
    pub ts: i64,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub double_value: Option<f64>,
}

impl Reading {
    /// Numeric reading; the string column carries the same value as text
    pub fn number(topic: impl Into<String>, ts: i64, value: f64) -> Self {
        Self {
            topic: topic.into(),
            ts,
            string_value: Some(value.to_string()),
            double_value: Some(value),
        }
    }

    /// Text reading with no numeric shadow
    pub fn text(topic: impl Into<String>, ts: i64, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ts,
            string_value: Some(value.into()),
            double_value: None,
        }
    }

    /// Boolean reading stored as "t"/"0" with a 1/0 numeric shadow
    pub fn flag(topic: impl Into<String>, ts: i64, on: bool) -> Self {
        Self {
            topic: topic.into(),
            ts,
            string_value: Some(if on { "t" } else { "0" }.to_string()),
            double_value: Some(if on { 1.0 } else { 0.0 }),
        }
    }
}

/// One row of an aggregation query: `(timestamp, representative text, number)`
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub ts: i64,
    pub text: Option<String>,
    pub number: Option<f64>,
}
