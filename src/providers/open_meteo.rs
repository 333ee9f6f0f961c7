//! Open-Meteo forecast API adapter
//!
//! The only structured source. It is addressed by coordinates and an absolute
//! date, and serves daily and hourly data from the same request.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{ForecastProvider, ForecastRequest, ProviderForecast, check_horizon, fetch_text};
use crate::Result;
use crate::error::MeteoError;
use crate::models::{Condition, DailySnapshot, HourlySeries, ProviderId};
use crate::normalize::{RawField, RawRecord};

/// Furthest day the API forecasts
pub const HORIZON_DAYS: u8 = 15;

const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,\
precipitation_probability_max,wind_speed_10m_max,wind_direction_10m_dominant,relative_humidity_2m_mean";

const HOURLY_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
precipitation,precipitation_probability,weather_code,wind_speed_10m,wind_direction_10m";

/// Forecast response from `OpenMeteo` API
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<DailyData>,
    hourly: Option<HourlyData>,
}

/// Daily weather data from `OpenMeteo`
#[derive(Debug, Deserialize)]
struct DailyData {
    time: Vec<String>,
    weather_code: Option<Vec<Option<u8>>>,
    #[serde(rename = "temperature_2m_max")]
    temperature_max: Option<Vec<Option<f32>>>,
    #[serde(rename = "temperature_2m_min")]
    temperature_min: Option<Vec<Option<f32>>>,
    precipitation_probability_max: Option<Vec<Option<f32>>>,
    #[serde(rename = "wind_speed_10m_max")]
    wind_speed_max: Option<Vec<Option<f32>>>,
    #[serde(rename = "wind_direction_10m_dominant")]
    wind_direction: Option<Vec<Option<u16>>>,
    #[serde(rename = "relative_humidity_2m_mean")]
    humidity: Option<Vec<Option<f32>>>,
}

/// Hourly weather data from `OpenMeteo`
#[derive(Debug, Deserialize)]
struct HourlyData {
    time: Vec<String>,
    #[serde(rename = "temperature_2m")]
    temperature: Option<Vec<Option<f32>>>,
    apparent_temperature: Option<Vec<Option<f32>>>,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Option<Vec<Option<f32>>>,
    precipitation: Option<Vec<Option<f32>>>,
    precipitation_probability: Option<Vec<Option<f32>>>,
    weather_code: Option<Vec<Option<u8>>>,
    #[serde(rename = "wind_speed_10m")]
    wind_speed: Option<Vec<Option<f32>>>,
    #[serde(rename = "wind_direction_10m")]
    wind_direction: Option<Vec<Option<u16>>>,
}

/// Value `i` of an optional column, if present and not null
fn at<T: Copy>(column: &Option<Vec<Option<T>>>, i: usize) -> Option<T> {
    column.as_ref().and_then(|values| values.get(i).copied().flatten())
}

fn set_value<T: ToString>(raw: &mut RawRecord, field: RawField, value: Option<T>) {
    if let Some(value) = value {
        raw.set(field, value.to_string());
    }
}

/// Map a WMO weather interpretation code to a condition
#[must_use]
pub fn condition_from_code(code: u8) -> Option<Condition> {
    let condition = match code {
        0 => Condition::Clear,
        1 => Condition::MostlyClear,
        2 => Condition::PartlyCloudy,
        3 => Condition::Overcast,
        45 | 48 => Condition::Fog,
        51 | 53 | 55 | 56 | 57 => Condition::Drizzle,
        61 => Condition::LightRain,
        63 => Condition::Rain,
        65 | 82 => Condition::HeavyRain,
        66 | 67 => Condition::Sleet,
        71 | 73 | 75 | 77 | 85 | 86 => Condition::Snow,
        80 | 81 => Condition::Showers,
        95 | 96 | 99 => Condition::Thunderstorm,
        _ => return None,
    };
    Some(condition)
}

/// Vocabulary of this source: WMO codes, bare or as `wmo-NN` icon references
#[must_use]
pub fn vocabulary(text: &str) -> Option<Condition> {
    let code = text.trim().trim_start_matches("wmo-");
    code.parse::<u8>().ok().and_then(condition_from_code)
}

impl DailyData {
    fn record(&self, date: &str) -> Option<RawRecord> {
        let i = self.time.iter().position(|t| t == date)?;
        let mut raw = RawRecord::new();
        set_value(&mut raw, RawField::WeatherCode, at(&self.weather_code, i));
        set_value(&mut raw, RawField::MinTemp, at(&self.temperature_min, i));
        set_value(&mut raw, RawField::MaxTemp, at(&self.temperature_max, i));
        set_value(&mut raw, RawField::PrecipitationProb, at(&self.precipitation_probability_max, i));
        set_value(&mut raw, RawField::WindSpeed, at(&self.wind_speed_max, i));
        set_value(&mut raw, RawField::WindDirection, at(&self.wind_direction, i));
        set_value(&mut raw, RawField::Humidity, at(&self.humidity, i));
        Some(raw)
    }
}

impl HourlyData {
    fn records(&self, date: &str) -> Vec<RawRecord> {
        self.time
            .iter()
            .enumerate()
            .filter(|(_, time)| time.starts_with(date))
            .map(|(i, time)| {
                let mut raw = RawRecord::new().with(RawField::Label, time);
                set_value(&mut raw, RawField::Temperature, at(&self.temperature, i));
                set_value(&mut raw, RawField::FeelsLike, at(&self.apparent_temperature, i));
                set_value(&mut raw, RawField::Humidity, at(&self.humidity, i));
                set_value(&mut raw, RawField::Precipitation, at(&self.precipitation, i));
                set_value(&mut raw, RawField::PrecipitationProb, at(&self.precipitation_probability, i));
                set_value(&mut raw, RawField::WindSpeed, at(&self.wind_speed, i));
                set_value(&mut raw, RawField::WindDirection, at(&self.wind_direction, i));
                if let Some(code) = at(&self.weather_code, i) {
                    raw.set(RawField::WeatherCode, code.to_string());
                    raw.set(RawField::IconSrc, format!("wmo-{code}"));
                }
                raw
            })
            .collect()
    }
}

/// Adapter for `api.open-meteo.com`
#[derive(Debug, Clone)]
pub struct OpenMeteo {
    client: Client,
    base_url: String,
}

impl OpenMeteo {
    #[must_use]
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn forecast_url(&self, req: &ForecastRequest) -> Result<String> {
        let location = req.location()?;
        let date = req.date().format("%Y-%m-%d").to_string();
        Ok(format!(
            "{}/forecast?latitude={:.4}&longitude={:.4}&daily={DAILY_FIELDS}&hourly={HOURLY_FIELDS}&timezone={}&start_date={date}&end_date={date}",
            self.base_url,
            location.latitude,
            location.longitude,
            urlencoding::encode(req.now.timezone().name()),
        ))
    }

    /// One request serving both halves
    async fn fetch(&self, req: &ForecastRequest) -> Result<(RawRecord, Vec<RawRecord>)> {
        check_horizon(ProviderId::OpenMeteo, req.day, HORIZON_DAYS)?;
        let url = self.forecast_url(req)?;
        let body = fetch_text(&self.client, ProviderId::OpenMeteo, &url).await?;
        let response: ForecastResponse = serde_json::from_str(&body).map_err(|e| {
            MeteoError::extraction(format!("Failed to parse OpenMeteo forecast response: {e}"))
        })?;

        let date = req.date().format("%Y-%m-%d").to_string();
        let summary = response
            .daily
            .as_ref()
            .and_then(|daily| daily.record(&date))
            .unwrap_or_default();
        let rows = response
            .hourly
            .as_ref()
            .map(|hourly| hourly.records(&date))
            .unwrap_or_default();
        debug!(
            "Open-Meteo: daily summary present: {}, {} hourly rows for {date}",
            summary.has_weather_fields(),
            rows.len()
        );
        Ok((summary, rows))
    }

    fn page(summary: RawRecord, rows: Vec<RawRecord>) -> super::ScrapedPage {
        super::ScrapedPage {
            summary,
            rows,
            degraded: false,
        }
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteo {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn needs_coordinates(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_daily(&self, req: &ForecastRequest) -> Result<DailySnapshot> {
        let (summary, rows) = self.fetch(req).await?;
        Self::page(summary, rows).snapshot(self.id(), req)
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_hourly(&self, req: &ForecastRequest) -> Result<HourlySeries> {
        let (summary, rows) = self.fetch(req).await?;
        Self::page(summary, rows).series(self.id(), req)
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_forecast(&self, req: &ForecastRequest) -> Result<ProviderForecast> {
        let (summary, rows) = self.fetch(req).await?;
        let page = Self::page(summary, rows);
        Ok(ProviderForecast {
            snapshot: page.snapshot(self.id(), req)?,
            hourly: page.series(self.id(), req),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Location, Reliability};
    use crate::providers::test_support::request_at;
    use rstest::rstest;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn milano() -> Location {
        Location::new("Milano", "Milano", 45.4643, 9.1895)
    }

    fn body() -> serde_json::Value {
        serde_json::json!({
            "latitude": 45.46, "longitude": 9.18, "timezone": "Europe/Rome",
            "daily": {
                "time": ["2026-10-19"],
                "weather_code": [61],
                "temperature_2m_max": [17.2],
                "temperature_2m_min": [9.8],
                "precipitation_probability_max": [70],
                "wind_speed_10m_max": [14.4],
                "wind_direction_10m_dominant": [225],
                "relative_humidity_2m_mean": [82.4]
            },
            "hourly": {
                "time": ["2026-10-19T08:00", "2026-10-19T09:00", "2026-10-19T10:00", "2026-10-19T11:00"],
                "temperature_2m": [10.1, 11.0, 12.4, null],
                "apparent_temperature": [8.9, 9.8, 11.2, 12.0],
                "relative_humidity_2m": [90, 88, 85, 80],
                "precipitation": [0.0, 0.2, 1.4, 0.0],
                "precipitation_probability": [20, 40, 70, 50],
                "weather_code": [3, 61, 63, 2],
                "wind_speed_10m": [5.0, 7.2, 9.0, 11.5],
                "wind_direction_10m": [200, 210, 225, 240]
            }
        })
    }

    #[rstest]
    #[case("0", Some(Condition::Clear))]
    #[case("3", Some(Condition::Overcast))]
    #[case("wmo-45", Some(Condition::Fog))]
    #[case("95", Some(Condition::Thunderstorm))]
    #[case("42", None)]
    #[case("sereno", None)]
    fn test_vocabulary(#[case] text: &str, #[case] expected: Option<Condition>) {
        assert_eq!(vocabulary(text), expected);
    }

    #[tokio::test]
    async fn test_forecast_from_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("start_date", "2026-10-19"))
            .and(query_param("end_date", "2026-10-19"))
            .and(query_param("timezone", "Europe/Rome"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenMeteo::new(Client::new(), format!("{}/v1", server.uri()));
        let req = request_at("Milano", 0, 10, 0).with_geocoding(Ok(milano()));
        let forecast = provider.fetch_forecast(&req).await.unwrap();

        let snapshot = forecast.snapshot;
        assert_eq!(snapshot.min_temp, Some(9.8));
        assert_eq!(snapshot.max_temp, Some(17.2));
        assert_eq!(snapshot.condition, Condition::LightRain);
        assert_eq!(snapshot.humidity, Some(82));
        assert_eq!(snapshot.wind.unwrap().direction.as_deref(), Some("SW"));
        assert_eq!(snapshot.reliability, Reliability::High);

        let hourly = forecast.hourly.unwrap();
        let hours: Vec<u8> = hourly.entries.iter().map(|e| e.hour).collect();
        assert_eq!(hours, vec![10, 11]);
        assert_eq!(hourly.entries[0].fields.condition, Condition::Rain);
        assert_eq!(hourly.entries[0].fields.icon_ref.as_deref(), Some("wmo-63"));
        assert_eq!(hourly.entries[1].fields.temperature, None);
    }

    #[tokio::test]
    async fn test_beyond_horizon_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body()))
            .expect(0)
            .mount(&server)
            .await;

        let provider = OpenMeteo::new(Client::new(), format!("{}/v1", server.uri()));
        let req = request_at("Milano", 16, 10, 0).with_geocoding(Ok(milano()));
        let err = provider.fetch_daily(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRange);
    }

    #[tokio::test]
    async fn test_geocoding_miss_is_reported_as_location_not_found() {
        let provider = OpenMeteo::new(Client::new(), "http://127.0.0.1:9/v1".into());
        let req = request_at("Roma", 0, 10, 0)
            .with_geocoding(Err(MeteoError::location_not_found("Roma")));
        let err = provider.fetch_daily(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocationNotFound);
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = OpenMeteo::new(Client::new(), format!("{}/v1", server.uri()));
        let req = request_at("Milano", 1, 10, 0).with_geocoding(Ok(milano()));
        let err = provider.fetch_hourly(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnreachable);
    }
}
