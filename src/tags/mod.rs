//! Tag matching, role catalogs, tagging and reports
//!
//! Points carry marker tags (`m_tags`) and key-value tags (`kv_tags`). This
//! module maps semantic roles onto points by tag set, bulk-applies tags to
//! topics, and renders tag reports.

pub mod catalog;
pub mod matcher;
pub mod report;
pub mod tagging;

pub use catalog::{ahu_key_metrics, equipment_dashboard_metrics};
pub use matcher::{match_all, resolve_roles, Role, RoleCatalog, RoleMatch, RoleResolution, TagQuery};
pub use report::{tag_report, trending_report, Report, MARKER_CELL};
pub use tagging::{
    cleanup_id, make_random_id, slugify, tag_topics, TagSpec, TagTopicsRequest, TaggedTopic,
    TopicFilter,
};
