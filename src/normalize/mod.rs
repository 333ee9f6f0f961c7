//! Normalizer: provider-specific raw field bags into the canonical schema
//!
//! Everything here is a pure function of its input. Missing or unparsable
//! values become placeholders (`None` / [`Condition::Unavailable`]), never
//! errors, and the same record always normalizes to the same output.

pub mod vocabulary;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    Attribution, Condition, DailySnapshot, DayOffset, HourlyCandidate, HourlyFields, ProviderId,
    Reliability, Wind,
};
use crate::providers::vocabulary_for;

/// Keys of the raw field bag adapters fill before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RawField {
    /// Time label of an hourly row ("09:00", "9", "2026-10-19T09:00")
    Label,
    MinTemp,
    MaxTemp,
    Temperature,
    FeelsLike,
    /// Explicit condition text from the source
    Description,
    /// Numeric condition code (WMO for Open-Meteo)
    WeatherCode,
    IconAlt,
    IconTitle,
    IconSrc,
    /// Precipitation amount or intensity phrase
    Precipitation,
    PrecipitationProb,
    /// Free-text wind ("NE 10 km/h")
    Wind,
    WindSpeed,
    /// Compass label or degrees
    WindDirection,
    Humidity,
    /// Surrounding text of the row or block, used for keyword scans
    Context,
}

impl RawField {
    /// Fields that carry no weather value on their own
    fn is_structural(self) -> bool {
        matches!(self, RawField::Label | RawField::Context)
    }
}

/// Opaque, provider-specific field bag extracted before normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: BTreeMap<RawField, String>,
}

impl RawRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value; blank values are ignored
    pub fn set(&mut self, field: RawField, value: impl AsRef<str>) {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.fields.insert(field, value.to_string());
        }
    }

    /// Store an optional value extracted by a cascade
    pub fn set_opt(&mut self, field: RawField, value: Option<String>) {
        if let Some(value) = value {
            self.set(field, value);
        }
    }

    #[must_use]
    pub fn with(mut self, field: RawField, value: impl AsRef<str>) -> Self {
        self.set(field, value);
        self
    }

    #[must_use]
    pub fn get(&self, field: RawField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether anything besides labels and context text was recovered
    #[must_use]
    pub fn has_weather_fields(&self) -> bool {
        self.fields.keys().any(|field| !field.is_structural())
    }
}

/// Request-level facts a daily snapshot is stamped with
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotContext {
    pub city: String,
    pub day_offset: DayOffset,
    pub date: NaiveDate,
    /// Data came from coarse day-part buckets rather than the source's daily summary
    pub degraded: bool,
}

/// Normalize a daily raw record into a snapshot
#[must_use]
pub fn normalize_daily(raw: &RawRecord, provider: ProviderId, ctx: &SnapshotContext) -> DailySnapshot {
    let mut min_temp = raw.get(RawField::MinTemp).and_then(parse_number);
    let mut max_temp = raw.get(RawField::MaxTemp).and_then(parse_number);
    if let (Some(min), Some(max)) = (min_temp, max_temp) {
        if min > max {
            min_temp = Some(max);
            max_temp = Some(min);
        }
    }

    let mut snapshot = DailySnapshot {
        provider: Attribution::direct(provider),
        city: ctx.city.clone(),
        day_offset: ctx.day_offset,
        date: ctx.date,
        min_temp,
        max_temp,
        condition: infer_condition(raw, provider),
        wind: parse_wind(raw),
        humidity: raw.get(RawField::Humidity).and_then(parse_percent),
        precipitation_prob: raw.get(RawField::PrecipitationProb).and_then(parse_percent),
        reliability: Reliability::Low,
    };
    let mut reliability =
        Reliability::from_completeness(snapshot.populated_fields(), DailySnapshot::FIELD_COUNT);
    if ctx.degraded {
        reliability = reliability.capped(Reliability::Medium);
    }
    snapshot.reliability = reliability;
    snapshot
}

/// Normalize an hourly raw record; the time label is validated later
#[must_use]
pub fn normalize_hourly(raw: &RawRecord, provider: ProviderId) -> HourlyCandidate {
    let fields = HourlyFields {
        temperature: raw.get(RawField::Temperature).and_then(parse_number),
        condition: infer_condition(raw, provider),
        precipitation: raw.get(RawField::Precipitation).and_then(parse_precipitation),
        precipitation_prob: raw.get(RawField::PrecipitationProb).and_then(parse_percent),
        wind: parse_wind(raw),
        humidity: raw.get(RawField::Humidity).and_then(parse_percent),
        feels_like: raw.get(RawField::FeelsLike).and_then(parse_number),
        icon_ref: raw.get(RawField::IconSrc).map(str::to_string),
    };
    HourlyCandidate::new(raw.get(RawField::Label).unwrap_or_default(), fields)
}

/// Condition inference chain
///
/// 1. explicit description or code, 2. icon alt/title, 3. keyword scan of the
/// surrounding text, 4. precipitation phrase or amount, 5. unavailable.
#[must_use]
pub fn infer_condition(raw: &RawRecord, provider: ProviderId) -> Condition {
    let vocabulary = vocabulary_for(provider);
    let translate = |text: &str| vocabulary(text).or_else(|| vocabulary::keyword_scan(text));

    [RawField::Description, RawField::WeatherCode]
        .into_iter()
        .filter_map(|field| raw.get(field))
        .find_map(translate)
        .or_else(|| {
            [RawField::IconAlt, RawField::IconTitle]
                .into_iter()
                .filter_map(|field| raw.get(field))
                .find_map(translate)
        })
        .or_else(|| raw.get(RawField::Context).and_then(vocabulary::keyword_scan))
        .or_else(|| {
            raw.get(RawField::Precipitation).and_then(|text| {
                vocabulary::from_precipitation_phrase(text)
                    .or_else(|| parse_number(text).and_then(vocabulary::from_precipitation_amount))
            })
        })
        .unwrap_or(Condition::Unavailable)
}

/// Min/max temperature across hourly slots
#[must_use]
pub fn temperature_range<'a>(slots: impl IntoIterator<Item = &'a HourlyFields>) -> Option<(f32, f32)> {
    slots
        .into_iter()
        .filter_map(|fields| fields.temperature)
        .fold(None, |range, t| match range {
            None => Some((t, t)),
            Some((min, max)) => Some((min.min(t), max.max(t))),
        })
}

/// First decimal number in `text`; accepts Italian decimal commas and a
/// leading minus (ASCII or U+2212)
#[must_use]
pub fn parse_number(text: &str) -> Option<f32> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(char::is_ascii_digit)?;
    let negative = start > 0 && matches!(chars[start - 1], '-' | '−');

    let mut number = String::new();
    if negative {
        number.push('-');
    }
    let mut seen_separator = false;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            number.push(c);
        } else if (c == '.' || c == ',')
            && !seen_separator
            && chars.get(i + 1).is_some_and(char::is_ascii_digit)
        {
            seen_separator = true;
            number.push('.');
        } else {
            break;
        }
        i += 1;
    }
    number.parse::<f32>().ok()
}

/// Percentage clamped to 0..=100
#[must_use]
pub fn parse_percent(text: &str) -> Option<u8> {
    parse_number(text).map(|v| v.round().clamp(0.0, 100.0) as u8)
}

/// Precipitation amount in mm; "assenti"/"nessuna" count as zero
#[must_use]
pub fn parse_precipitation(text: &str) -> Option<f32> {
    let lower = text.to_lowercase();
    if lower.contains("assent") || lower.contains("nessun") || lower == "-" {
        return Some(0.0);
    }
    parse_number(text).map(|v| v.max(0.0))
}

const COMPASS: &[(&str, &str)] = &[
    ("NNE", "NNE"),
    ("ENE", "ENE"),
    ("ESE", "ESE"),
    ("SSE", "SSE"),
    ("SSO", "SSW"),
    ("SSW", "SSW"),
    ("OSO", "WSW"),
    ("WSW", "WSW"),
    ("ONO", "WNW"),
    ("WNW", "WNW"),
    ("NNO", "NNW"),
    ("NNW", "NNW"),
    ("NE", "NE"),
    ("SE", "SE"),
    ("SO", "SW"),
    ("SW", "SW"),
    ("NO", "NW"),
    ("NW", "NW"),
    ("N", "N"),
    ("E", "E"),
    ("S", "S"),
    ("O", "W"),
    ("W", "W"),
];

/// Compass label from a token list, Italian letters mapped to English ones
#[must_use]
pub fn parse_compass(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(degrees) = trimmed
        .strip_suffix('°')
        .unwrap_or(trimmed)
        .parse::<f32>()
        .ok()
    {
        let degrees = degrees.rem_euclid(360.0).round() as u16;
        return Some(Wind::cardinal_from_degrees(degrees).to_string());
    }
    text.split(|c: char| !c.is_alphabetic())
        .filter(|token| !token.is_empty())
        .find_map(|token| {
            COMPASS
                .iter()
                .find(|(label, _)| *label == token)
                .map(|(_, english)| (*english).to_string())
        })
}

fn wind_speed_kmh(text: &str) -> Option<f32> {
    let value = parse_number(text)?;
    let lower = text.to_lowercase();
    let kmh = if lower.contains("m/s") {
        value * 3.6
    } else if lower.contains("nod") || lower.contains("kt") {
        value * 1.852
    } else {
        value
    };
    Some((kmh * 10.0).round() / 10.0)
}

/// Wind from the free-text field, or from separate speed/direction fields
#[must_use]
pub fn parse_wind(raw: &RawRecord) -> Option<Wind> {
    let text = raw.get(RawField::Wind);
    let speed = raw
        .get(RawField::WindSpeed)
        .and_then(wind_speed_kmh)
        .or_else(|| text.and_then(wind_speed_kmh));
    let direction = raw
        .get(RawField::WindDirection)
        .and_then(parse_compass)
        .or_else(|| text.and_then(parse_compass));
    Wind::new(speed, direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ctx() -> SnapshotContext {
        SnapshotContext {
            city: "Milano".into(),
            day_offset: DayOffset::TODAY,
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            degraded: false,
        }
    }

    #[rstest]
    #[case("21°", Some(21.0))]
    #[case("12,5 °C", Some(12.5))]
    #[case("-3°", Some(-3.0))]
    #[case("−2", Some(-2.0))]
    #[case("Min 8 / Max 15", Some(8.0))]
    #[case("1.", Some(1.0))]
    #[case("n/d", None)]
    fn test_parse_number(#[case] text: &str, #[case] expected: Option<f32>) {
        assert_eq!(parse_number(text), expected);
    }

    #[rstest]
    #[case("65%", Some(65))]
    #[case("120 %", Some(100))]
    #[case("33.6%", Some(34))]
    #[case("--", None)]
    fn test_parse_percent(#[case] text: &str, #[case] expected: Option<u8>) {
        assert_eq!(parse_percent(text), expected);
    }

    #[test]
    fn test_parse_precipitation() {
        assert_eq!(parse_precipitation("assenti"), Some(0.0));
        assert_eq!(parse_precipitation("Nessuna"), Some(0.0));
        assert_eq!(parse_precipitation("1,2 mm"), Some(1.2));
        assert_eq!(parse_precipitation("debole"), None);
    }

    #[rstest]
    #[case("NE 10 km/h", Some(10.0), Some("NE"))]
    #[case("8 km/h SO", Some(8.0), Some("SW"))]
    #[case("Debole da O 5", Some(5.0), Some("W"))]
    #[case("3 m/s", Some(10.8), None)]
    #[case("calmo", None, None)]
    fn test_parse_free_text_wind(
        #[case] text: &str,
        #[case] speed: Option<f32>,
        #[case] direction: Option<&str>,
    ) {
        let raw = RawRecord::new().with(RawField::Wind, text);
        let wind = parse_wind(&raw);
        assert_eq!(wind.as_ref().and_then(|w| w.speed_kmh), speed);
        assert_eq!(wind.as_ref().and_then(|w| w.direction.as_deref()), direction);
    }

    #[test]
    fn test_parse_wind_from_degrees() {
        let raw = RawRecord::new()
            .with(RawField::WindSpeed, "14.2")
            .with(RawField::WindDirection, "225");
        let wind = parse_wind(&raw).unwrap();
        assert_eq!(wind.speed_kmh, Some(14.2));
        assert_eq!(wind.direction.as_deref(), Some("SW"));
    }

    #[test]
    fn test_condition_chain_prefers_description() {
        let raw = RawRecord::new()
            .with(RawField::Description, "Sereno")
            .with(RawField::IconAlt, "pioggia")
            .with(RawField::Context, "temporale");
        assert_eq!(infer_condition(&raw, ProviderId::IlMeteo), Condition::Clear);
    }

    #[test]
    fn test_condition_chain_falls_back_to_icon_then_context() {
        let raw = RawRecord::new()
            .with(RawField::IconTitle, "Nebbia")
            .with(RawField::Context, "temporale");
        assert_eq!(infer_condition(&raw, ProviderId::IlMeteo), Condition::Fog);

        let raw = RawRecord::new().with(RawField::Context, "09:00 15° temporale forte");
        assert_eq!(infer_condition(&raw, ProviderId::IlMeteo), Condition::Thunderstorm);
    }

    #[test]
    fn test_condition_chain_uses_precipitation_signal() {
        let raw = RawRecord::new().with(RawField::Precipitation, "debole");
        assert_eq!(infer_condition(&raw, ProviderId::MeteoIt), Condition::LightRain);

        let raw = RawRecord::new().with(RawField::Precipitation, "7,5 mm");
        assert_eq!(infer_condition(&raw, ProviderId::MeteoIt), Condition::HeavyRain);

        let raw = RawRecord::new().with(RawField::Precipitation, "0 mm");
        assert_eq!(infer_condition(&raw, ProviderId::MeteoIt), Condition::Unavailable);
    }

    #[test]
    fn test_normalize_daily_fills_placeholders() {
        let raw = RawRecord::new()
            .with(RawField::MinTemp, "21°")
            .with(RawField::MaxTemp, "9°")
            .with(RawField::Description, "Poco nuvoloso");
        let snapshot = normalize_daily(&raw, ProviderId::IlMeteo, &ctx());

        assert_eq!(snapshot.min_temp, Some(9.0));
        assert_eq!(snapshot.max_temp, Some(21.0));
        assert_eq!(snapshot.condition, Condition::MostlyClear);
        assert!(snapshot.wind.is_none());
        assert!(snapshot.humidity.is_none());
        assert_eq!(snapshot.reliability, Reliability::Medium);
        assert_eq!(snapshot.provider, Attribution::direct(ProviderId::IlMeteo));
    }

    #[test]
    fn test_degraded_snapshot_is_capped() {
        let raw = RawRecord::new()
            .with(RawField::MinTemp, "9")
            .with(RawField::MaxTemp, "18")
            .with(RawField::Description, "sereno")
            .with(RawField::Wind, "N 5 km/h")
            .with(RawField::Humidity, "60%")
            .with(RawField::PrecipitationProb, "0%");
        let mut context = ctx();
        assert_eq!(
            normalize_daily(&raw, ProviderId::MeteoIt, &context).reliability,
            Reliability::High
        );
        context.degraded = true;
        assert_eq!(
            normalize_daily(&raw, ProviderId::MeteoIt, &context).reliability,
            Reliability::Medium
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = RawRecord::new()
            .with(RawField::Label, "14:00")
            .with(RawField::Temperature, "18,4°")
            .with(RawField::IconAlt, "rovesci")
            .with(RawField::Precipitation, "2 mm")
            .with(RawField::Wind, "OSO 12 km/h")
            .with(RawField::Humidity, "81%");

        let first = normalize_hourly(&raw, ProviderId::ThreeBMeteo);
        let second = normalize_hourly(&raw, ProviderId::ThreeBMeteo);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let daily_a = normalize_daily(&raw, ProviderId::ThreeBMeteo, &ctx());
        let daily_b = normalize_daily(&raw, ProviderId::ThreeBMeteo, &ctx());
        assert_eq!(daily_a, daily_b);
    }

    #[test]
    fn test_record_tracks_usable_fields() {
        let mut raw = RawRecord::new();
        raw.set(RawField::Label, "10:00");
        raw.set(RawField::Temperature, "   ");
        raw.set_opt(RawField::Context, Some("10:00".into()));
        assert!(!raw.is_empty());
        assert!(!raw.has_weather_fields());
        raw.set(RawField::Humidity, "50%");
        assert!(raw.has_weather_fields());
    }

    #[test]
    fn test_temperature_range() {
        let candidates = vec![
            HourlyCandidate::new("09:00", HourlyFields { temperature: Some(12.0), ..Default::default() }),
            HourlyCandidate::new("12:00", HourlyFields::default()),
            HourlyCandidate::new("15:00", HourlyFields { temperature: Some(19.5), ..Default::default() }),
        ];
        assert_eq!(
            temperature_range(candidates.iter().map(|c| &c.fields)),
            Some((12.0, 19.5))
        );
        assert_eq!(temperature_range(std::iter::empty()), None);
    }
}
