//! Current values, charts and equipment summaries

mod charts;
mod current;
mod equipment;

pub use charts::{charts_for_points, ChartSpec, BOOL_UNIT};
pub use current::{
    add_current_values, format_epoch, latest, CurrentReading, CurrentValue, EpochTime,
    PointSummary, NO_DATA,
};
pub use equipment::{
    ahu_current_values, equipment_current_values, equipment_metrics, MetricTopic, RoleValue,
};
