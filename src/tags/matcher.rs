//! Tag matching
//!
//! A [`TagQuery`] selects points whose marker tags are a superset of the
//! required set and disjoint from the excluded set. A [`RoleCatalog`] maps
//! semantic roles to queries; [`resolve_roles`] picks one point per role.
//!
//! When several points qualify for a role the one carrying the fewest marker
//! tags wins: generic role tag sets are often subsets of more specific ones
//! (every return air temp sensor also looks like a space air temp sensor),
//! and the point with fewer tags is the plain sensor.

use crate::store::SensorPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Required/excluded marker tag predicate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagQuery {
    pub required: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded: BTreeSet<String>,
}

impl TagQuery {
    /// Query requiring all of `tags`
    pub fn has(tags: &[&str]) -> Self {
        Self {
            required: tags.iter().map(|t| t.to_string()).collect(),
            excluded: BTreeSet::new(),
        }
    }

    /// Builder: reject points carrying any of `tags`
    pub fn excluding(mut self, tags: &[&str]) -> Self {
        self.excluded.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn matches(&self, m_tags: &BTreeSet<String>) -> bool {
        self.required.is_subset(m_tags) && self.excluded.is_disjoint(m_tags)
    }

    pub fn matches_point(&self, point: &SensorPoint) -> bool {
        self.matches(&point.m_tags)
    }

    /// Matching points in input order
    pub fn candidates<'a>(&self, points: &'a [SensorPoint]) -> Vec<&'a SensorPoint> {
        points.iter().filter(|p| self.matches_point(p)).collect()
    }
}

/// A named role and the query that finds its point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(flatten)]
    pub query: TagQuery,
}

/// Ordered role catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCatalog {
    roles: Vec<Role>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a role
    pub fn role(mut self, name: impl Into<String>, query: TagQuery) -> Self {
        self.roles.push(Role {
            name: name.into(),
            query,
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&TagQuery> {
        self.roles.iter().find(|r| r.name == name).map(|r| &r.query)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Role> {
        self.roles.iter()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Outcome for one role that had at least one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleMatch {
    pub role: String,
    /// Winning point (fewest marker tags)
    pub selected: SensorPoint,
    /// Every candidate, winner first, for diagnostics
    pub candidates: Vec<SensorPoint>,
}

impl RoleMatch {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Per-role results in catalog order; roles without candidates are absent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoleResolution {
    pub matches: Vec<RoleMatch>,
}

impl RoleResolution {
    pub fn get(&self, role: &str) -> Option<&RoleMatch> {
        self.matches.iter().find(|m| m.role == role)
    }

    /// Winning point for a role
    pub fn selected(&self, role: &str) -> Option<&SensorPoint> {
        self.get(role).map(|m| &m.selected)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RoleMatch> {
        self.matches.iter()
    }
}

/// Select one point per role.
///
/// Ties on tag count keep the input order, so callers that pass points in a
/// stable order (the store orders by entity id) get a stable winner.
pub fn resolve_roles(points: &[SensorPoint], catalog: &RoleCatalog) -> RoleResolution {
    let mut matches = Vec::new();

    for role in catalog.iter() {
        let mut candidates = role.query.candidates(points);
        if candidates.is_empty() {
            continue;
        }

        candidates.sort_by_key(|p| p.m_tags.len());

        if candidates.len() > 1 {
            tracing::warn!(
                "Role '{}' has {} candidate points, using the one with fewest tags",
                role.name,
                candidates.len()
            );
            for candidate in &candidates {
                tracing::warn!("--> {} with tags {:?}", candidate.topic, candidate.m_tags);
            }
        }

        matches.push(RoleMatch {
            role: role.name.clone(),
            selected: candidates[0].clone(),
            candidates: candidates.into_iter().cloned().collect(),
        });
    }

    RoleResolution { matches }
}

/// Every `(role, point)` pair that matches, in catalog then input order
pub fn match_all<'a>(
    points: &'a [SensorPoint],
    catalog: &'a RoleCatalog,
) -> Vec<(&'a str, &'a SensorPoint)> {
    catalog
        .iter()
        .flat_map(|role| {
            role.query
                .candidates(points)
                .into_iter()
                .map(move |p| (role.name.as_str(), p))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PointKind;

    fn point(id: &str, tags: &[&str]) -> SensorPoint {
        SensorPoint::new(id, format!("ahu1/{}", id), PointKind::Number).markers(tags)
    }

    #[test]
    fn test_superset_and_disjoint() {
        let query = TagQuery::has(&["air", "temp"]).excluding(&["return"]);

        assert!(query.matches_point(&point("a", &["air", "temp", "sensor"])));
        assert!(!query.matches_point(&point("b", &["air", "sensor"])));
        assert!(!query.matches_point(&point("c", &["air", "temp", "return"])));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let query = TagQuery::default();
        assert!(query.matches_point(&point("a", &[])));
    }

    #[test]
    fn test_fewest_tags_wins() {
        let points = vec![
            point("rat", &["air", "his", "point", "sensor", "temp", "return", "zone"]),
            point("sat", &["air", "his", "point", "sensor", "temp"]),
        ];
        let catalog =
            RoleCatalog::new().role("Space Air Temp", TagQuery::has(&["air", "his", "point", "sensor", "temp"]));

        let resolution = resolve_roles(&points, &catalog);
        let m = resolution.get("Space Air Temp").unwrap();

        assert_eq!(m.selected.entity_id, "sat");
        assert!(m.is_ambiguous());
        let ids: Vec<&str> = m.candidates.iter().map(|p| p.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["sat", "rat"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let points = vec![point("b", &["cooling", "x"]), point("a", &["cooling", "y"])];
        let catalog = RoleCatalog::new().role("Cooling", TagQuery::has(&["cooling"]));

        let resolution = resolve_roles(&points, &catalog);
        assert_eq!(resolution.selected("Cooling").unwrap().entity_id, "b");
    }

    #[test]
    fn test_absent_roles_are_omitted() {
        let points = vec![point("heat", &["his", "point", "sensor", "heat"])];
        let catalog = RoleCatalog::new()
            .role("Cooling", TagQuery::has(&["cooling"]))
            .role("Heating", TagQuery::has(&["heat"]).excluding(&["cooling"]));

        let resolution = resolve_roles(&points, &catalog);
        assert_eq!(resolution.len(), 1);
        assert!(resolution.get("Cooling").is_none());
        assert!(!resolution.get("Heating").unwrap().is_ambiguous());
    }

    #[test]
    fn test_resolution_follows_catalog_order() {
        let points = vec![point("p", &["a", "b"])];
        let catalog = RoleCatalog::new()
            .role("Second", TagQuery::has(&["b"]))
            .role("First", TagQuery::has(&["a"]));

        let resolution = resolve_roles(&points, &catalog);
        let roles: Vec<&str> = resolution.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["Second", "First"]);
    }

    #[test]
    fn test_match_all_reports_every_point() {
        let points = vec![point("z1", &["temp", "zone"]), point("z2", &["temp", "zone"])];
        let catalog = RoleCatalog::new().role("ZoneTemp", TagQuery::has(&["temp", "zone"]));

        let pairs = match_all(&points, &catalog);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(role, _)| *role == "ZoneTemp"));
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"[
            {"name": "Cooling", "required": ["cooling", "his"], "excluded": ["heat"]},
            {"name": "CO2", "required": ["co2"]}
        ]"#;
        let catalog: RoleCatalog = serde_json::from_str(json).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("Cooling").unwrap().excluded.contains("heat"));
        assert!(catalog.get("CO2").unwrap().excluded.is_empty());
    }
}
