//! External Integrations
//!
//! Best-effort HTTP collaborators:
//! - Dashboard service (Grafana-compatible dashboard API)
//! - Geocoding (Google geocode API)
//!
//! Transport failures never surface as errors here. They are logged as
//! warnings and the call returns `None`, since neither feature is required
//! for the analytics core to do its job.

mod dashboard;
mod geocoding;

pub use dashboard::{
    equipment_dashboard, point_dashboard, DashboardClient, DashboardConfig, DashboardReceipt,
    AHU_TEMPLATE, POINT_TEMPLATE,
};
pub use geocoding::{
    address_key, compose_site_address, GeoCache, GeoLocation, GeocodingClient, GeocodingConfig,
};

/// Errors that can occur while preparing an integration call
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type IntegrationResult<T> = std::result::Result<T, IntegrationError>;

/// Build a reqwest client the same way for every collaborator
pub(crate) fn http_client(
    timeout: std::time::Duration,
    accept_invalid_certs: bool,
) -> IntegrationResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("seas-analytics/", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;
    Ok(client)
}
