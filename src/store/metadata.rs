//! Metadata store - entities and their tags
//!
//! Sites, equipment and points share one `entities` table. Points are the rows
//! with a topic. Marker tags are a JSON array, key-value tags and BACnet
//! fields are JSON objects.

use super::{MetadataSource, PointKind, SensorPoint, StoreError, StoreResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entities (
        entity_id TEXT PRIMARY KEY,
        topic TEXT UNIQUE,
        kind TEXT,
        unit TEXT,
        description TEXT,
        equipment_id TEXT,
        site_id TEXT,
        m_tags TEXT NOT NULL DEFAULT '[]',
        kv_tags TEXT NOT NULL DEFAULT '{}',
        bacnet_fields TEXT NOT NULL DEFAULT '{}'
    );
    CREATE INDEX IF NOT EXISTS idx_entities_equipment ON entities(equipment_id);
";

const POINT_COLUMNS: &str = "entity_id, topic, kind, unit, description, equipment_id, site_id, \
                             m_tags, kv_tags, bacnet_fields";

/// A non-point entity such as a site or an equipment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub entity_id: String,
    #[serde(default)]
    pub m_tags: BTreeSet<String>,
    #[serde(default)]
    pub kv_tags: BTreeMap<String, String>,
}

/// JSON seed file accepted by [`MetadataConnection::import_json`]
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub points: Vec<SensorPoint>,
}

/// Connection factory for the metadata database
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a scoped connection; it is released when dropped
    pub fn connect(&self) -> StoreResult<MetadataConnection> {
        MetadataConnection::open(&self.path, self.busy_timeout)
    }
}

/// An open connection to the metadata database
pub struct MetadataConnection {
    conn: Connection,
}

impl MetadataConnection {
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert or replace a site/equipment entity
    pub fn save_entity(&self, entity: &EntityRecord) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entities (entity_id, m_tags, kv_tags)
             VALUES (?1, ?2, ?3)",
            params![
                entity.entity_id,
                serde_json::to_string(&entity.m_tags)?,
                serde_json::to_string(&entity.kv_tags)?
            ],
        )?;
        Ok(())
    }

    /// Load a [`SeedFile`] document
    pub fn import_json<R: Read>(&self, reader: R) -> StoreResult<(usize, usize)> {
        let seed: SeedFile = serde_json::from_reader(reader)?;

        for entity in &seed.entities {
            self.save_entity(entity)?;
        }
        for point in &seed.points {
            self.save_point(point)?;
        }

        tracing::info!(
            "Seeded {} entities and {} points",
            seed.entities.len(),
            seed.points.len()
        );
        Ok((seed.entities.len(), seed.points.len()))
    }

    fn query_points(&self, sql: &str, param: Option<&str>) -> StoreResult<Vec<SensorPoint>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let raw = match param {
            Some(p) => stmt
                .query_map(params![p], RawPoint::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], RawPoint::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        raw.into_iter().map(RawPoint::into_point).collect()
    }

    fn query_point(&self, sql: &str, param: &str) -> StoreResult<Option<SensorPoint>> {
        let raw = self
            .conn
            .query_row(sql, params![param], RawPoint::from_row)
            .optional()?;
        raw.map(RawPoint::into_point).transpose()
    }
}

impl MetadataSource for MetadataConnection {
    fn point(&self, entity_id: &str) -> StoreResult<Option<SensorPoint>> {
        self.query_point(
            &format!(
                "SELECT {} FROM entities WHERE entity_id = ?1 AND topic IS NOT NULL",
                POINT_COLUMNS
            ),
            entity_id,
        )
    }

    fn point_for_topic(&self, topic: &str) -> StoreResult<Option<SensorPoint>> {
        self.query_point(
            &format!("SELECT {} FROM entities WHERE topic = ?1", POINT_COLUMNS),
            topic,
        )
    }

    fn points_for_equipment(&self, equipment_id: &str) -> StoreResult<Vec<SensorPoint>> {
        self.query_points(
            &format!(
                "SELECT {} FROM entities WHERE equipment_id = ?1 AND topic IS NOT NULL
                 ORDER BY entity_id",
                POINT_COLUMNS
            ),
            Some(equipment_id),
        )
    }

    fn all_points(&self) -> StoreResult<Vec<SensorPoint>> {
        self.query_points(
            &format!(
                "SELECT {} FROM entities WHERE topic IS NOT NULL ORDER BY topic",
                POINT_COLUMNS
            ),
            None,
        )
    }

    fn entity_tags(&self, entity_id: &str) -> StoreResult<Option<BTreeMap<String, String>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT kv_tags FROM entities WHERE entity_id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| parse_kv(entity_id, &json)).transpose()
    }

    fn save_point(&self, point: &SensorPoint) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entities
             (entity_id, topic, kind, unit, description, equipment_id, site_id,
              m_tags, kv_tags, bacnet_fields)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                point.entity_id,
                point.topic,
                point.kind.as_str(),
                point.unit,
                point.description,
                point.equipment_id,
                point.site_id,
                serde_json::to_string(&point.m_tags)?,
                serde_json::to_string(&point.kv_tags)?,
                serde_json::to_string(&point.bacnet_fields)?
            ],
        )?;
        Ok(())
    }
}

/// Row image before the JSON columns are decoded
struct RawPoint {
    entity_id: String,
    topic: String,
    kind: Option<String>,
    unit: Option<String>,
    description: Option<String>,
    equipment_id: Option<String>,
    site_id: Option<String>,
    m_tags: String,
    kv_tags: String,
    bacnet_fields: String,
}

impl RawPoint {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entity_id: row.get(0)?,
            topic: row.get(1)?,
            kind: row.get(2)?,
            unit: row.get(3)?,
            description: row.get(4)?,
            equipment_id: row.get(5)?,
            site_id: row.get(6)?,
            m_tags: row.get(7)?,
            kv_tags: row.get(8)?,
            bacnet_fields: row.get(9)?,
        })
    }

    fn into_point(self) -> StoreResult<SensorPoint> {
        let m_tags: BTreeSet<String> =
            serde_json::from_str(&self.m_tags).map_err(|e| StoreError::CorruptTags {
                entity_id: self.entity_id.clone(),
                error: e.to_string(),
            })?;
        let kv_tags = parse_kv(&self.entity_id, &self.kv_tags)?;
        let bacnet_fields = parse_kv(&self.entity_id, &self.bacnet_fields)?;

        Ok(SensorPoint {
            kind: self
                .kind
                .as_deref()
                .map(PointKind::parse)
                .unwrap_or_default(),
            entity_id: self.entity_id,
            topic: self.topic,
            unit: self.unit.filter(|u| !u.is_empty()),
            description: self.description,
            equipment_id: self.equipment_id,
            site_id: self.site_id,
            m_tags,
            kv_tags,
            bacnet_fields,
        })
    }
}

/// Decode a JSON object column; non-string values keep their JSON text
fn parse_kv(entity_id: &str, json: &str) -> StoreResult<BTreeMap<String, String>> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| StoreError::CorruptTags {
            entity_id: entity_id.to_string(),
            error: e.to_string(),
        })?;

    Ok(map
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}
