//! Site geocoding
//!
//! Composes a postal address from a site's `geo*` tags and resolves it to
//! coordinates through the Google geocode API. Lookups are cached by address
//! hash in a caller-supplied store. Without an API key nothing is resolved.

use super::{http_client, IntegrationResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const ADDRESS_TAGS: &[&str] = &["geoCity", "geoCountry", "geoPostalCode", "geoState", "geoStreet"];
const STREET_TAG: &str = "geoStreet";
const FREEFORM_TAG: &str = "geoAddr";

/// Configuration for the geocoding client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Google API key; geocoding is disabled when absent
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Resolved site coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub site_id: String,
}

/// Store for resolved locations, keyed by [`address_key`]
pub trait GeoCache {
    fn get_location(&self, key: &str) -> Option<GeoLocation>;
    fn put_location(&mut self, key: String, location: GeoLocation);
}

impl GeoCache for HashMap<String, GeoLocation> {
    fn get_location(&self, key: &str) -> Option<GeoLocation> {
        self.get(key).cloned()
    }

    fn put_location(&mut self, key: String, location: GeoLocation) {
        self.insert(key, location);
    }
}

/// Address to geocode, or `None` when the tags are not enough to locate
/// the site.
///
/// The non-empty `geoCity`, `geoCountry`, `geoPostalCode`, `geoState` and
/// `geoStreet` values are joined with `", "`. Without a street the free-form
/// `geoAddr` is appended and is then required.
pub fn compose_site_address(kv_tags: &BTreeMap<String, String>) -> Option<String> {
    let non_empty = |tag: &str| kv_tags.get(tag).map(String::as_str).filter(|v| !v.is_empty());

    let mut parts: Vec<&str> = kv_tags
        .iter()
        .filter(|(tag, value)| ADDRESS_TAGS.contains(&tag.as_str()) && !value.is_empty())
        .map(|(_, value)| value.as_str())
        .collect();

    if non_empty(STREET_TAG).is_none() {
        parts.push(non_empty(FREEFORM_TAG)?);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Hex SHA-256 of an address
pub fn address_key(address: &str) -> String {
    hex::encode(Sha256::digest(address.as_bytes()))
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Google geocode API client
pub struct GeocodingClient {
    client: Client,
    config: GeocodingConfig,
}

impl GeocodingClient {
    pub fn new(config: GeocodingConfig) -> IntegrationResult<Self> {
        let client = http_client(Duration::from_secs(config.request_timeout_secs), false)?;
        Ok(Self { client, config })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Locate a site from its tags, consulting `cache` first
    pub async fn locate_site<C: GeoCache + ?Sized>(
        &self,
        kv_tags: &BTreeMap<String, String>,
        site_id: &str,
        cache: &mut C,
    ) -> Option<GeoLocation> {
        let api_key = self.config.api_key.as_deref().filter(|k| !k.is_empty())?;
        let address = compose_site_address(kv_tags)?;
        let key = address_key(&address);

        if let Some(location) = cache.get_location(&key) {
            tracing::debug!("Using cached location for {}", address);
            return Some(location);
        }

        let location = self.geocode(&address, api_key, site_id).await?;
        cache.put_location(key, location.clone());
        Some(location)
    }

    async fn geocode(&self, address: &str, api_key: &str, site_id: &str) -> Option<GeoLocation> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("address", address), ("key", api_key)])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Could not geocode {}: {}", address, e);
                return None;
            }
        };

        let body: GeocodeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Invalid geocode response for {}: {}", address, e);
                return None;
            }
        };

        if body.status != "OK" {
            tracing::warn!("Geocode status {} for {}", body.status, address);
            return None;
        }

        let result = body.results.into_iter().next()?;
        Some(GeoLocation {
            latitude: result.geometry.location.lat,
            longitude: result.geometry.location.lng,
            site_id: site_id.to_string(),
        })
    }
}
