//! Dashboard service client
//!
//! Dashboards are built from JSON templates by pure placeholder substitution
//! and then posted to a Grafana-compatible API. Creation and deletion are
//! fire-and-forget: a connection failure is logged and reported as `None`.

use super::{http_client, IntegrationError, IntegrationResult};
use crate::summary::MetricTopic;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Template for a single point dashboard
pub const POINT_TEMPLATE: &str = "point-dashboard.json";
/// Template for an equipment (AHU) dashboard
pub const AHU_TEMPLATE: &str = "ahu-dashboard.json";

const POINT_NAME: &str = "${pointName}";
const EQUIPMENT_NAME: &str = "${equipmentName}";
const TOPIC: &str = "${topic}";
const METRIC: &str = "${metric}";

/// Configuration for the dashboard client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    /// Base URL of the dashboard service (e.g., "http://localhost:3000")
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Directory holding the dashboard templates
    pub templates_dir: PathBuf,
    pub request_timeout_secs: u64,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:3000".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            templates_dir: PathBuf::from("data/dashboard"),
            request_timeout_secs: 10,
            accept_invalid_certs: true,
        }
    }
}

/// What the dashboard service answered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardReceipt {
    /// HTTP status code
    #[serde(skip_deserializing)]
    pub status: u16,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl DashboardReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Dashboard for a single point: `${pointName}` is replaced in the dashboard
/// title, the first panel title and the first panel target's SQL.
pub fn point_dashboard(template: &Value, point_name: &str) -> IntegrationResult<Value> {
    let mut doc = template.clone();
    for pointer in [
        "/dashboard/title",
        "/dashboard/panels/0/title",
        "/dashboard/panels/0/targets/0/rawSql",
    ] {
        substitute(&mut doc, pointer, &[(POINT_NAME, point_name)])?;
    }
    Ok(doc)
}

/// Dashboard for an equipment: one target per metric, cloned from the first
/// target of the first panel, with `refId` set to `A<i>`.
pub fn equipment_dashboard(
    template: &Value,
    equipment_name: &str,
    metrics: &[MetricTopic],
) -> IntegrationResult<Value> {
    let mut doc = template.clone();
    for pointer in ["/dashboard/title", "/dashboard/panels/0/title"] {
        substitute(&mut doc, pointer, &[(EQUIPMENT_NAME, equipment_name)])?;
    }

    let target_item = doc
        .pointer("/dashboard/panels/0/targets/0")
        .cloned()
        .ok_or_else(|| missing("/dashboard/panels/0/targets/0"))?;

    let mut targets = Vec::with_capacity(metrics.len());
    for (i, metric) in metrics.iter().enumerate() {
        let mut target = target_item.clone();
        substitute(
            &mut target,
            "/rawSql",
            &[(TOPIC, metric.topic.as_str()), (METRIC, metric.metric.as_str())],
        )?;
        if let Value::Object(fields) = &mut target {
            fields.insert("refId".to_string(), Value::String(format!("A{}", i)));
        }
        targets.push(target);
    }

    let slot = doc
        .pointer_mut("/dashboard/panels/0/targets")
        .ok_or_else(|| missing("/dashboard/panels/0/targets"))?;
    *slot = Value::Array(targets);

    Ok(doc)
}

fn substitute(doc: &mut Value, pointer: &str, pairs: &[(&str, &str)]) -> IntegrationResult<()> {
    let field = doc.pointer_mut(pointer).ok_or_else(|| missing(pointer))?;
    let Some(text) = field.as_str() else {
        return Err(IntegrationError::Template(format!(
            "{} is not a string",
            pointer
        )));
    };

    let replaced = pairs
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to));
    *field = Value::String(replaced);
    Ok(())
}

fn missing(pointer: &str) -> IntegrationError {
    IntegrationError::Template(format!("template has no {}", pointer))
}

/// Dashboard service REST client
pub struct DashboardClient {
    client: Client,
    config: DashboardConfig,
}

impl DashboardClient {
    pub fn new(config: DashboardConfig) -> IntegrationResult<Self> {
        let client = http_client(
            Duration::from_secs(config.request_timeout_secs),
            config.accept_invalid_certs,
        )?;
        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Read a template from the templates directory
    pub fn load_template(&self, name: &str) -> IntegrationResult<Value> {
        let path = self.config.templates_dir.join(name);
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build and post the dashboard of a single point
    pub async fn create_point_dashboard(
        &self,
        point_name: &str,
    ) -> IntegrationResult<Option<DashboardReceipt>> {
        tracing::info!("create_point_dashboard: {}", point_name);
        let template = self.load_template(POINT_TEMPLATE)?;
        let doc = point_dashboard(&template, point_name)?;
        Ok(self.create(&doc).await)
    }

    /// Build and post the dashboard of an equipment
    pub async fn create_equipment_dashboard(
        &self,
        equipment_name: &str,
        metrics: &[MetricTopic],
    ) -> IntegrationResult<Option<DashboardReceipt>> {
        tracing::info!(
            "create_equipment_dashboard: {} with {} metrics",
            equipment_name,
            metrics.len()
        );
        let template = self.load_template(AHU_TEMPLATE)?;
        let doc = equipment_dashboard(&template, equipment_name, metrics)?;
        Ok(self.create(&doc).await)
    }

    /// Post a dashboard document; `None` when the service is unreachable
    pub async fn create(&self, doc: &Value) -> Option<DashboardReceipt> {
        if !self.config.enabled {
            tracing::info!("Dashboard service disabled, not creating dashboard");
            return None;
        }

        let url = format!("{}/api/dashboards/db", self.config.base_url);
        let request = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(doc);

        let receipt = self.send(request, "create").await;
        tracing::info!("create dashboard done: {:?}", receipt);
        receipt
    }

    /// Delete a dashboard by uid; an empty uid is logged and ignored
    pub async fn delete(&self, uid: &str) -> Option<DashboardReceipt> {
        tracing::info!("delete dashboard, uid: {}", uid);
        if uid.is_empty() {
            tracing::error!("dashboard uid should not be empty");
            return None;
        }
        if !self.config.enabled {
            tracing::info!("Dashboard service disabled, not deleting dashboard");
            return None;
        }

        let url = format!("{}/api/dashboards/uid/{}", self.config.base_url, uid);
        let request = self
            .client
            .delete(&url)
            .basic_auth(&self.config.username, Some(&self.config.password));

        let receipt = self.send(request, "delete").await;
        tracing::info!("delete dashboard result: {:?}", receipt);
        receipt
    }

    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Option<DashboardReceipt> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Could not {} the dashboard: {}", action, e);
                return None;
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let mut receipt = match serde_json::from_str::<DashboardReceipt>(&text) {
            Ok(receipt) => receipt,
            Err(_) => DashboardReceipt {
                message: Some(text).filter(|t| !t.is_empty()),
                ..Default::default()
            },
        };
        receipt.status = status;
        Some(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point_template() -> Value {
        json!({
            "dashboard": {
                "title": "Point ${pointName}",
                "panels": [{
                    "title": "${pointName} values",
                    "targets": [{
                        "refId": "A",
                        "rawSql": "SELECT ts, double_value FROM data WHERE topic = '${pointName}'"
                    }]
                }]
            },
            "overwrite": true
        })
    }

    fn ahu_template() -> Value {
        json!({
            "dashboard": {
                "title": "${equipmentName}",
                "panels": [{
                    "title": "${equipmentName} metrics",
                    "targets": [{
                        "refId": "A",
                        "format": "time_series",
                        "rawSql": "SELECT ts, '${metric}' AS metric, double_value FROM data WHERE topic = '${topic}'"
                    }]
                }]
            }
        })
    }

    fn metric(metric: &str, topic: &str) -> MetricTopic {
        MetricTopic {
            metric: metric.to_string(),
            topic: topic.to_string(),
        }
    }

    #[test]
    fn test_point_dashboard_substitution() {
        let template = point_template();
        let doc = point_dashboard(&template, "ahu1/sat").unwrap();

        assert_eq!(doc["dashboard"]["title"], "Point ahu1/sat");
        assert_eq!(doc["dashboard"]["panels"][0]["title"], "ahu1/sat values");
        assert_eq!(
            doc["dashboard"]["panels"][0]["targets"][0]["rawSql"],
            "SELECT ts, double_value FROM data WHERE topic = 'ahu1/sat'"
        );
        assert_eq!(doc["overwrite"], true);

        // template is left untouched
        assert_eq!(template["dashboard"]["title"], "Point ${pointName}");
    }

    #[test]
    fn test_equipment_dashboard_targets() {
        let metrics = vec![metric("ZoneTemp", "vav1/zt"), metric("ZoneTempSP", "vav1/sp")];
        let doc = equipment_dashboard(&ahu_template(), "AHU 1", &metrics).unwrap();

        assert_eq!(doc["dashboard"]["title"], "AHU 1");
        let targets = doc["dashboard"]["panels"][0]["targets"].as_array().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0]["refId"], "A0");
        assert_eq!(targets[1]["refId"], "A1");
        assert_eq!(targets[1]["format"], "time_series");
        assert_eq!(
            targets[1]["rawSql"],
            "SELECT ts, 'ZoneTempSP' AS metric, double_value FROM data WHERE topic = 'vav1/sp'"
        );
    }

    #[test]
    fn test_equipment_dashboard_without_metrics_has_no_targets() {
        let doc = equipment_dashboard(&ahu_template(), "AHU 1", &[]).unwrap();
        assert!(doc["dashboard"]["panels"][0]["targets"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_malformed_template() {
        let err = point_dashboard(&json!({"dashboard": {"title": "x"}}), "p").unwrap_err();
        assert!(matches!(err, IntegrationError::Template(_)));

        let err = point_dashboard(&json!({"dashboard": {"title": 3}}), "p").unwrap_err();
        assert!(err.to_string().contains("not a string"));
    }

    #[test]
    fn test_load_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(POINT_TEMPLATE),
            serde_json::to_string(&point_template()).unwrap(),
        )
        .unwrap();

        let client = DashboardClient::new(DashboardConfig {
            templates_dir: dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.load_template(POINT_TEMPLATE).unwrap(), point_template());
        assert!(matches!(
            client.load_template(AHU_TEMPLATE),
            Err(IntegrationError::Io(_))
        ));
    }

    fn unreachable_client() -> DashboardClient {
        DashboardClient::new(DashboardConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_service_is_not_an_error() {
        let client = unreachable_client();
        let doc = point_dashboard(&point_template(), "p").unwrap();
        assert!(client.create(&doc).await.is_none());
        assert!(client.delete("abc").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_uid_is_ignored() {
        assert!(unreachable_client().delete("").await.is_none());
    }
}
