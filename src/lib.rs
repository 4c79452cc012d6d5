//! # SEAS Analytics
//!
//! Analytics and reporting layer for building-energy-management data:
//! resolves human-friendly time ranges, aggregates sensor readings by point
//! kind, maps equipment points to semantic roles by tag set, and builds tag
//! reports and dashboard definitions.
//!
//! ## Modules
//!
//! - [`store`]: SQLite-backed time-series and metadata stores
//! - [`query`]: Range tokens, aggregation shapes and point value queries
//! - [`tags`]: Tag matching, role catalogs, bulk tagging and reports
//! - [`summary`]: Current values, charts and equipment summaries
//! - [`integrations`]: Dashboard service and geocoding clients
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seas_analytics::query::{point_values, ValuesRequest};
//! use seas_analytics::store::{MetadataSource, MetadataStore, TimeSeriesStore};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let readings = TimeSeriesStore::new("timeseries.db", Duration::from_secs(5)).connect()?;
//!     let meta = MetadataStore::new("metadata.db", Duration::from_secs(5)).connect()?;
//!
//!     if let Some(point) = meta.point_for_topic("campus/ahu1/sat")? {
//!         let request = ValuesRequest::new().range("7 days");
//!         let series = point_values(&readings, &point, &request, chrono::Utc::now())?;
//!         println!("{} samples in {}", series.len(), series.window);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod integrations;
pub mod query;
pub mod store;
pub mod summary;
pub mod tags;

// Re-export top-level types for convenience
pub use store::{
    MetadataSource, MetadataStore, PointKind, Reading, ReadingSource, SensorPoint, StoreError,
    StoreResult, TimeSeriesStore,
};

pub use query::{
    point_values, AggregationFn, Granularity, QueryError, QueryResult, Sample, SampleValue,
    Series, TimeWindow, ValuesRequest,
};

pub use tags::{resolve_roles, RoleCatalog, RoleResolution, TagQuery};

pub use summary::{add_current_values, latest, CurrentValue, PointSummary};

pub use integrations::{DashboardClient, GeocodingClient, IntegrationError};

pub use config::{generate_default_config, Config, ConfigError};
