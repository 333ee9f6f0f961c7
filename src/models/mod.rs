//! Canonical data models for the forecast aggregator
//!
//! This module contains the unified schema every provider is normalized into:
//! - Location: geocoded city coordinates
//! - Condition: the canonical weather condition taxonomy
//! - Day: day offsets and day-part buckets
//! - Provider: provider identities and answer attribution
//! - Forecast: daily snapshots, hourly entries and aggregate results

pub mod condition;
pub mod day;
pub mod forecast;
pub mod location;
pub mod provider;

// Re-export all public types for convenient access
pub use condition::Condition;
pub use day::{DayOffset, DayPart};
pub use forecast::{
    AggregateResponse, DailySnapshot, HourlyCandidate, HourlyEntry, HourlyFields, HourlyReport,
    HourlySeries, HourlyStatus, ProviderFailure, ProviderResult, Reliability, Wind,
};
pub use location::Location;
pub use provider::{Attribution, ProviderId};
