//! Bulk tagging of topics
//!
//! Selects topics from the time-series store, creates a point for any topic
//! that has none yet, and applies a set of tags to each selected point.

use crate::store::{MetadataSource, PointKind, ReadingSource, SensorPoint, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Length of the random suffix of generated point ids
pub const RANDOM_ID_LEN: usize = 8;

/// Topic name filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TopicFilter {
    /// Topic contains the text (case-insensitive)
    Contains(String),
    /// Topic does not contain the text (case-insensitive)
    NotContains(String),
}

impl TopicFilter {
    /// Parse `{"t"|"type": "c"|"nc", "f"|"value": "..."}`.
    ///
    /// Unknown types and empty values yield `None` and are skipped.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let field = |short: &str, long: &str| {
            value
                .get(short)
                .or_else(|| value.get(long))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        };

        let kind = field("t", "type")?;
        let text = field("f", "value")?.to_string();
        match kind {
            "c" => Some(TopicFilter::Contains(text)),
            "nc" => Some(TopicFilter::NotContains(text)),
            _ => None,
        }
    }

    pub fn accepts(&self, topic: &str) -> bool {
        let topic = topic.to_lowercase();
        match self {
            TopicFilter::Contains(text) => topic.contains(&text.to_lowercase()),
            TopicFilter::NotContains(text) => !topic.contains(&text.to_lowercase()),
        }
    }
}

/// Deserialize a filter list, dropping entries [`TopicFilter::from_json`] rejects
fn skip_unknown_filters<'de, D>(deserializer: D) -> Result<Vec<TopicFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .iter()
        .filter_map(|value| {
            let filter = TopicFilter::from_json(value);
            if filter.is_none() {
                tracing::debug!("Skipping topic filter {}", value);
            }
            filter
        })
        .collect())
}

/// A tag to apply; no value means a marker tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpec {
    pub tag: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl TagSpec {
    pub fn marker(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: None,
        }
    }

    pub fn kv(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: Some(value.into()),
        }
    }

    /// Parse `tag` or `tag=value`
    pub fn parse(s: &str) -> Self {
        match s.split_once('=') {
            Some((tag, value)) => Self::kv(tag.trim(), value.trim()),
            None => Self::marker(s.trim()),
        }
    }
}

/// Which topics to tag and with what
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagTopicsRequest {
    #[serde(default, deserialize_with = "skip_unknown_filters")]
    pub filters: Vec<TopicFilter>,
    #[serde(default)]
    pub tags: Vec<TagSpec>,
    /// Tag every topic passing the filters
    #[serde(default)]
    pub select_all: bool,
    /// Explicit topics, used when `select_all` is false
    #[serde(default)]
    pub topics: Vec<String>,
    /// Only consider topics that have no point yet
    #[serde(default)]
    pub only_unmapped: bool,
}

/// A topic that was tagged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedTopic {
    pub topic: String,
    pub point: String,
    pub name: Option<String>,
}

/// Apply a tagging request and return what was tagged
pub fn tag_topics<R, M>(
    readings: &R,
    meta: &M,
    request: &TagTopicsRequest,
) -> StoreResult<Vec<TaggedTopic>>
where
    R: ReadingSource + ?Sized,
    M: MetadataSource + ?Sized,
{
    let mut topics = readings.list_topics()?;

    if request.only_unmapped {
        let mapped: HashSet<String> = meta.all_points()?.into_iter().map(|p| p.topic).collect();
        topics.retain(|t| !mapped.contains(t));
    }

    tracing::info!("tag_topics: using filters {:?}", request.filters);
    topics.retain(|t| request.filters.iter().all(|f| f.accepts(t)));

    let explicit: HashSet<&str> = request.topics.iter().map(String::as_str).collect();
    let mut updated = Vec::new();

    for topic in topics {
        if !request.select_all && !explicit.contains(topic.as_str()) {
            continue;
        }
        tracing::info!("tag_topics: apply to topic {}", topic);

        let mut point = match meta.point_for_topic(&topic)? {
            Some(point) => point,
            None => {
                let entity_id = make_random_id(&topic);
                let mut point = SensorPoint::new(entity_id.clone(), topic.clone(), PointKind::String);
                point.add_tag("id", Some(&entity_id));
                point
            }
        };

        point.add_tag("point", None);
        point.add_tag("his", None);
        if point.display_name().is_none() {
            point.add_tag("dis", Some(&topic));
        }
        for spec in &request.tags {
            tracing::debug!("add tag {:?}", spec);
            point.add_tag(&spec.tag, spec.value.as_deref());
        }

        meta.save_point(&point)?;
        updated.push(TaggedTopic {
            name: point.display_name().map(str::to_string),
            point: point.entity_id,
            topic,
        });
    }

    Ok(updated)
}

/// Replace path separators so an id can be used in URLs
pub fn cleanup_id(id: &str) -> String {
    id.replace('/', "-")
}

/// Lowercase ASCII slug: alphanumerics and `_` are kept, runs of whitespace
/// and `-` collapse to one `-`, leading and trailing `-`/`_` are stripped
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// `slugify(description)` plus a random alphanumeric suffix
pub fn make_random_id(description: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(description), &random[..RANDOM_ID_LEN])
}
