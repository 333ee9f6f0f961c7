//! Canonical forecast schema: snapshots, hourly entries and aggregate results

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Attribution, Condition, DayOffset, Location, ProviderId};
use crate::error::{ErrorKind, MeteoError};

/// Wind reading; either half may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// Wind speed in km/h
    pub speed_kmh: Option<f32>,
    /// 16-point compass label the wind blows from (e.g. "NE", "SSW")
    pub direction: Option<String>,
}

impl Wind {
    /// `None` when neither speed nor direction is known
    #[must_use]
    pub fn new(speed_kmh: Option<f32>, direction: Option<String>) -> Option<Self> {
        if speed_kmh.is_none() && direction.is_none() {
            None
        } else {
            Some(Self {
                speed_kmh,
                direction,
            })
        }
    }

    /// Convert wind direction from degrees to cardinal direction
    #[must_use]
    pub fn cardinal_from_degrees(degrees: u16) -> &'static str {
        match degrees % 360 {
            0..=11 | 349..=359 => "N",
            12..=33 => "NNE",
            34..=56 => "NE",
            57..=78 => "ENE",
            79..=101 => "E",
            102..=123 => "ESE",
            124..=146 => "SE",
            147..=168 => "SSE",
            169..=191 => "S",
            192..=213 => "SSW",
            214..=236 => "SW",
            237..=258 => "WSW",
            259..=281 => "W",
            282..=303 => "WNW",
            304..=326 => "NW",
            _ => "NNW",
        }
    }
}

/// Confidence in a snapshot, derived from how many fields were recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    Low,
    Medium,
    High,
}

impl Reliability {
    #[must_use]
    pub fn from_completeness(populated: usize, total: usize) -> Self {
        if total == 0 {
            return Reliability::Low;
        }
        let share = populated as f32 / total as f32;
        if share >= 0.8 {
            Reliability::High
        } else if share >= 0.5 {
            Reliability::Medium
        } else {
            Reliability::Low
        }
    }

    /// Never report more confidence than `ceiling`
    #[must_use]
    pub fn capped(self, ceiling: Reliability) -> Self {
        self.min(ceiling)
    }
}

/// One provider's summary of one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub provider: Attribution,
    /// City as requested
    pub city: String,
    pub day_offset: DayOffset,
    pub date: NaiveDate,
    /// Minimum temperature in Celsius
    pub min_temp: Option<f32>,
    /// Maximum temperature in Celsius
    pub max_temp: Option<f32>,
    pub condition: Condition,
    pub wind: Option<Wind>,
    /// Relative humidity (0-100%)
    pub humidity: Option<u8>,
    /// Precipitation probability (0-100%)
    pub precipitation_prob: Option<u8>,
    pub reliability: Reliability,
}

impl DailySnapshot {
    pub const FIELD_COUNT: usize = 6;

    /// Number of weather fields holding a real value
    #[must_use]
    pub fn populated_fields(&self) -> usize {
        [
            self.min_temp.is_some(),
            self.max_temp.is_some(),
            self.condition.is_available(),
            self.wind.is_some(),
            self.humidity.is_some(),
            self.precipitation_prob.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// Weather fields of one hourly slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HourlyFields {
    /// Temperature in Celsius
    pub temperature: Option<f32>,
    pub condition: Condition,
    /// Precipitation amount in mm
    pub precipitation: Option<f32>,
    /// Precipitation probability (0-100%)
    pub precipitation_prob: Option<u8>,
    pub wind: Option<Wind>,
    /// Relative humidity (0-100%)
    pub humidity: Option<u8>,
    /// Perceived temperature in Celsius
    pub feels_like: Option<f32>,
    /// Source icon reference (URL or code) for the presentation layer
    pub icon_ref: Option<String>,
}

impl HourlyFields {
    pub const FIELD_COUNT: usize = 8;

    /// Number of fields holding the "unavailable" placeholder
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        [
            self.temperature.is_none(),
            !self.condition.is_available(),
            self.precipitation.is_none(),
            self.precipitation_prob.is_none(),
            self.wind.is_none(),
            self.humidity.is_none(),
            self.feels_like.is_none(),
            self.icon_ref.is_none(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }
}

/// Normalized hourly data still carrying its source time label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyCandidate {
    pub label: String,
    pub fields: HourlyFields,
}

impl HourlyCandidate {
    #[must_use]
    pub fn new(label: impl Into<String>, fields: HourlyFields) -> Self {
        Self {
            label: label.into(),
            fields,
        }
    }
}

/// One validated hourly slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub hour: u8,
    pub minute: u8,
    #[serde(flatten)]
    pub fields: HourlyFields,
}

impl HourlyEntry {
    #[must_use]
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Cleaned hourly data together with who supplied it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub provider: Attribution,
    pub entries: Vec<HourlyEntry>,
}

impl HourlySeries {
    #[must_use]
    pub fn new(provider: Attribution, entries: Vec<HourlyEntry>) -> Self {
        Self { provider, entries }
    }

    #[must_use]
    pub fn delegated_to(mut self, source: ProviderId) -> Self {
        self.provider = Attribution::delegated(source, self.provider);
        self
    }
}

/// Structured failure of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderFailure {
    #[must_use]
    pub fn from_error(provider: ProviderId, error: &MeteoError) -> Self {
        Self {
            provider,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one provider inside an aggregate request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderResult {
    Success {
        snapshot: DailySnapshot,
        hourly: Vec<HourlyEntry>,
        /// Why `hourly` is empty when the hourly half failed on its own
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hourly_error: Option<ProviderFailure>,
    },
    Error(ProviderFailure),
}

impl ProviderResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderResult::Success { .. })
    }

    /// Registered provider this result belongs to
    #[must_use]
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderResult::Success { snapshot, .. } => snapshot.provider.source,
            ProviderResult::Error(failure) => failure.provider,
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ProviderResult::Success { .. } => None,
            ProviderResult::Error(failure) => Some(failure.kind),
        }
    }
}

/// Every provider's answer for one (city, day) request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub city: String,
    /// Geocoded location; absent when geocoding failed
    pub location: Option<Location>,
    pub day_offset: DayOffset,
    /// One entry per registered provider, in registration order
    pub results: Vec<ProviderResult>,
    pub timestamp: DateTime<Utc>,
}

impl AggregateResponse {
    #[must_use]
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourlyStatus {
    Available,
    /// The provider answered but nothing is left after filtering
    Empty,
    Error,
}

/// Answer to the per-provider "hourly breakdown" request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyReport {
    pub provider: Attribution,
    pub city: String,
    pub day_offset: DayOffset,
    pub status: HourlyStatus,
    pub entries: Vec<HourlyEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderFailure>,
}

impl HourlyReport {
    #[must_use]
    pub fn from_series(city: &str, day_offset: DayOffset, series: HourlySeries) -> Self {
        let status = if series.entries.is_empty() {
            HourlyStatus::Empty
        } else {
            HourlyStatus::Available
        };
        let error = if series.entries.is_empty() {
            let empty = MeteoError::empty(format!("no hourly data left for {city} {day_offset}"));
            Some(ProviderFailure::from_error(series.provider.source, &empty))
        } else {
            None
        };
        Self {
            provider: series.provider,
            city: city.to_string(),
            day_offset,
            status,
            entries: series.entries,
            error,
        }
    }

    #[must_use]
    pub fn from_error(city: &str, day_offset: DayOffset, provider: ProviderId, error: &MeteoError) -> Self {
        Self {
            provider: Attribution::direct(provider),
            city: city.to_string(),
            day_offset,
            status: HourlyStatus::Error,
            entries: Vec::new(),
            error: Some(ProviderFailure::from_error(provider, error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> HourlyFields {
        HourlyFields {
            temperature: Some(14.0),
            condition: Condition::Cloudy,
            precipitation: Some(0.0),
            precipitation_prob: Some(10),
            wind: Wind::new(Some(8.0), Some("NE".into())),
            humidity: Some(70),
            feels_like: Some(13.0),
            icon_ref: Some("/icons/nuvoloso.png".into()),
        }
    }

    #[test]
    fn test_wind_direction_to_cardinal() {
        assert_eq!(Wind::cardinal_from_degrees(0), "N");
        assert_eq!(Wind::cardinal_from_degrees(90), "E");
        assert_eq!(Wind::cardinal_from_degrees(180), "S");
        assert_eq!(Wind::cardinal_from_degrees(270), "W");
        assert_eq!(Wind::cardinal_from_degrees(45), "NE");
        assert_eq!(Wind::cardinal_from_degrees(360), "N");
        assert_eq!(Wind::cardinal_from_degrees(340), "NNW");
    }

    #[test]
    fn test_wind_requires_some_data() {
        assert!(Wind::new(None, None).is_none());
        let wind = Wind::new(Some(12.4), None).unwrap();
        assert_eq!(wind.speed_kmh, Some(12.4));
        assert_eq!(wind.direction, None);
    }

    #[test]
    fn test_placeholder_count() {
        assert_eq!(full_fields().placeholder_count(), 0);
        assert_eq!(HourlyFields::default().placeholder_count(), HourlyFields::FIELD_COUNT);

        let mut partial = full_fields();
        partial.humidity = None;
        partial.condition = Condition::Unavailable;
        assert_eq!(partial.placeholder_count(), 2);
    }

    #[test]
    fn test_reliability_thresholds() {
        assert_eq!(Reliability::from_completeness(6, 6), Reliability::High);
        assert_eq!(Reliability::from_completeness(5, 6), Reliability::High);
        assert_eq!(Reliability::from_completeness(3, 6), Reliability::Medium);
        assert_eq!(Reliability::from_completeness(1, 6), Reliability::Low);
        assert_eq!(Reliability::from_completeness(0, 0), Reliability::Low);
        assert_eq!(Reliability::High.capped(Reliability::Medium), Reliability::Medium);
        assert_eq!(Reliability::Low.capped(Reliability::Medium), Reliability::Low);
    }

    #[test]
    fn test_provider_result_serializes_with_status_tag() {
        let failure = ProviderFailure::from_error(
            ProviderId::IlMeteo,
            &MeteoError::unreachable("HTTP 503"),
        );
        let json = serde_json::to_value(ProviderResult::Error(failure)).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "source_unreachable");
        assert_eq!(json["provider"], "ilmeteo");
    }

    #[test]
    fn test_hourly_entry_flattens_fields() {
        let entry = HourlyEntry {
            hour: 9,
            minute: 30,
            fields: full_fields(),
        };
        assert_eq!(entry.time_label(), "09:30");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["hour"], 9);
        assert_eq!(json["humidity"], 70);
    }

    #[test]
    fn test_empty_series_reports_empty_status() {
        let series = HourlySeries::new(Attribution::direct(ProviderId::MeteoIt), Vec::new());
        let report = HourlyReport::from_series("Milano", DayOffset::TODAY, series);
        assert_eq!(report.status, HourlyStatus::Empty);
        assert_eq!(report.error.map(|e| e.kind), Some(ErrorKind::EmptyResult));
    }
}
