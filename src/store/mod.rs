//! Time-series and metadata stores
//!
//! The analytics core reads from two SQLite-backed stores:
//!
//! - **Time-series**: `data(topic, ts, string_value, double_value)` with
//!   epoch-millisecond timestamps
//! - **Metadata**: `entities(entity_id, topic, kind, unit, ..., m_tags, kv_tags)`
//!   with tags stored as JSON columns
//!
//! Everything above this module talks to the stores through the
//! [`ReadingSource`] and [`MetadataSource`] traits, so a single connection can
//! be reused across many operations and released when it goes out of scope.

mod error;
mod metadata;
mod timeseries;
mod types;

pub use error::{StoreError, StoreResult};
pub use metadata::{EntityRecord, MetadataConnection, MetadataStore, SeedFile};
pub use timeseries::{TimeSeriesConnection, TimeSeriesStore};
pub use types::{PointKind, Reading, SensorPoint, SeriesRow, TEMPERATURE_UNITS};

use std::collections::BTreeMap;

/// Read access to time-series readings
pub trait ReadingSource {
    /// Most recent reading for a topic, `None` when the topic has no rows
    fn latest_reading(&self, topic: &str) -> StoreResult<Option<Reading>>;

    /// Run a query rendered by the aggregation builder.
    ///
    /// The statement takes `topic`, `start_ms` and `end_ms` as its three
    /// parameters and projects `(ts, text, number)`.
    fn fetch_rows(
        &self,
        sql: &str,
        topic: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> StoreResult<Vec<SeriesRow>>;

    /// Distinct topics, sorted
    fn list_topics(&self) -> StoreResult<Vec<String>>;
}

/// Access to point and entity metadata
pub trait MetadataSource {
    fn point(&self, entity_id: &str) -> StoreResult<Option<SensorPoint>>;

    fn point_for_topic(&self, topic: &str) -> StoreResult<Option<SensorPoint>>;

    /// Points belonging to an equipment, ordered by entity id
    fn points_for_equipment(&self, equipment_id: &str) -> StoreResult<Vec<SensorPoint>>;

    /// Every point with a topic, ordered by topic
    fn all_points(&self) -> StoreResult<Vec<SensorPoint>>;

    /// Key-value tags of any entity (sites and equipment included)
    fn entity_tags(&self, entity_id: &str) -> StoreResult<Option<BTreeMap<String, String>>>;

    fn save_point(&self, point: &SensorPoint) -> StoreResult<()>;
}
