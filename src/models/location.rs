//! Location model for geocoded cities

use serde::{Deserialize, Serialize};

/// A geocoded city, resolved once per request and shared read-only
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Free-text query the user typed
    pub query: String,
    /// Canonical place name from the geocoder's top candidate
    pub name: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Country code (ISO 3166-1 alpha-2)
    pub country: Option<String>,
    /// First-level administrative region (e.g. "Lombardia")
    pub region: Option<String>,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(query: impl Into<String>, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            query: query.into(),
            name: name.into(),
            latitude,
            longitude,
            country: None,
            region: None,
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}
