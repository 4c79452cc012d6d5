//! Range resolution and aggregation queries
//!
//! - **Range**: parse range tokens (`24h`, `3 months`, `today`, date pairs)
//!   into absolute UTC windows
//! - **Aggregation**: pick a SQL shape from the point kind and decode its rows
//! - **Executor**: run a point value query against a [`ReadingSource`]
//!
//! # Example
//!
//! ```rust,ignore
//! use seas_analytics::query::{point_values, AggregationFn, Granularity, ValuesRequest};
//!
//! let conn = store.connect()?;
//! let request = ValuesRequest::new()
//!     .range("7 days")
//!     .granularity(Granularity::Hour)
//!     .aggregation(AggregationFn::Max);
//! let series = point_values(&conn, &point, &request, chrono::Utc::now())?;
//! ```
//!
//! [`ReadingSource`]: crate::store::ReadingSource

mod aggregation;
mod error;
mod executor;
mod range;

pub use aggregation::{
    decode_bool, is_truthy, AggregationFn, Granularity, QueryShape, Sample, SampleValue,
};
pub use error::{QueryError, QueryResult};
pub use executor::{point_values, Series, ValuesRequest};
pub use range::{parse_datetime, TimeWindow, DAYS_PER_MONTH, DEFAULT_RANGE};
