//! `meteo-aggregator` - weather forecasts for Italian cities from several sources
//!
//! One request for a city and a day offset fans out to every registered
//! provider (the Open-Meteo JSON API and three scraped Italian forecast
//! sites), normalizes each answer into a common schema and returns all of
//! them side by side. A failing provider never takes the others down.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod extraction;
pub mod geocoding;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod telemetry;
pub mod timeline;
pub mod web;

// Re-export core types for public API
pub use aggregator::Aggregator;
pub use config::MeteoConfig;
pub use error::{ErrorKind, MeteoError};
pub use geocoding::{Geocode, OpenMeteoGeocoder};
pub use models::{AggregateResponse, DailySnapshot, HourlyReport, Location, ProviderId};
pub use providers::{ForecastProvider, ForecastRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, MeteoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
