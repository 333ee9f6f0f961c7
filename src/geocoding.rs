//! City name to coordinates, via the Open-Meteo geocoding API
//!
//! One network call per resolution, no retry. Only the top-ranked candidate
//! is kept.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::GeocodingConfig;
use crate::error::MeteoError;
use crate::models::Location;

/// Resolve a free-text city name to a [`Location`]
#[async_trait]
pub trait Geocode: Send + Sync {
    async fn resolve(&self, city: &str) -> Result<Location>;
}

/// Geocoding response from `OpenMeteo`
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country_code: Option<String>,
    admin1: Option<String>,
}

impl GeocodingResult {
    fn into_location(self, query: &str) -> Location {
        let mut location = Location::new(query, self.name, self.latitude, self.longitude);
        location.country = self.country_code;
        location.region = self.admin1;
        location
    }
}

/// [`Geocode`] backed by `geocoding-api.open-meteo.com`
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    client: Client,
    config: GeocodingConfig,
}

impl OpenMeteoGeocoder {
    #[must_use]
    pub fn new(client: Client, config: GeocodingConfig) -> Self {
        Self { client, config }
    }

    fn search_url(&self, city: &str) -> String {
        let mut url = format!(
            "{}/search?name={}&count={}&language={}&format=json",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(city),
            self.config.max_candidates,
            urlencoding::encode(&self.config.language),
        );
        if !self.config.country_code.is_empty() {
            url.push_str("&countryCode=");
            url.push_str(&urlencoding::encode(&self.config.country_code));
        }
        url
    }
}

#[async_trait]
impl Geocode for OpenMeteoGeocoder {
    #[instrument(skip(self), level = "debug")]
    async fn resolve(&self, city: &str) -> Result<Location> {
        let query = city.trim();
        if query.is_empty() {
            return Err(MeteoError::location_not_found("empty city name"));
        }

        let response = self.client.get(self.search_url(query)).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("geocoding '{query}' answered HTTP {status}");
            return Err(MeteoError::unreachable(format!(
                "geocoding service answered HTTP {status}"
            )));
        }

        let body: GeocodingResponse = response.json().await.map_err(|e| {
            MeteoError::unreachable(format!("undecodable geocoding response: {e}"))
        })?;

        let top = body
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| MeteoError::location_not_found(query.to_string()))?;

        let location = top.into_location(query);
        debug!(
            "Resolved '{query}' to {} ({})",
            location.name,
            location.format_coordinates()
        );
        Ok(location)
    }
}
