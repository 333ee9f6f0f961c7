//! Provider adapters
//!
//! | Provider | Kind | Day addressing | Horizon |
//! |----------|------|----------------|---------|
//! | Open-Meteo | JSON API | absolute date, coordinates | 0..=15 |
//! | IlMeteo | HTML | `""`, `domani`, `dopodomani`, `giorno-N` | 0..=6 |
//! | 3BMeteo | HTML | `/N` | daily 0..=6, hourly 0..=2 (then Open-Meteo) |
//! | Meteo.it | HTML | `?giorno=DD` | 0..=9 |
//!
//! Every adapter turns one upstream answer into canonical types and reports
//! every failure as a [`MeteoError`]; nothing escapes the adapter boundary as
//! a panic.

pub mod ilmeteo;
pub mod markup;
pub mod meteo_it;
pub mod open_meteo;
pub mod three_b_meteo;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use reqwest::Client;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::Result;
use crate::config::{HttpConfig, MeteoConfig};
use crate::error::MeteoError;
use crate::models::{
    Attribution, Condition, DailySnapshot, DayOffset, HourlyCandidate, HourlySeries, Location,
    ProviderId, Reliability,
};
use crate::normalize::{self, RawRecord, SnapshotContext};
use crate::timeline;

pub use ilmeteo::IlMeteo;
pub use meteo_it::MeteoIt;
pub use open_meteo::OpenMeteo;
pub use three_b_meteo::ThreeBMeteo;

/// Immutable per-request input shared by every adapter task
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    /// City as the user typed it
    pub city: String,
    pub day: DayOffset,
    /// Reference "now" in the configured timezone
    pub now: DateTime<Tz>,
    /// Geocoding outcome; `None` when no registered provider needed it
    pub geocoded: Option<std::result::Result<Location, MeteoError>>,
}

impl ForecastRequest {
    #[must_use]
    pub fn new(city: impl Into<String>, day: DayOffset, now: DateTime<Tz>) -> Self {
        Self {
            city: city.into(),
            day,
            now,
            geocoded: None,
        }
    }

    #[must_use]
    pub fn with_geocoding(mut self, outcome: std::result::Result<Location, MeteoError>) -> Self {
        self.geocoded = Some(outcome);
        self
    }

    /// Coordinates for coordinate-addressed sources
    pub fn location(&self) -> Result<&Location> {
        match &self.geocoded {
            Some(Ok(location)) => Ok(location),
            Some(Err(e)) => Err(e.clone()),
            None => Err(MeteoError::internal(format!(
                "'{}' was not geocoded for this request",
                self.city
            ))),
        }
    }

    /// Calendar date of the requested day in the reference timezone
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.day.date(&self.now)
    }

    /// Wall-clock time used by the "future only" filter
    #[must_use]
    pub fn now_time(&self) -> NaiveTime {
        self.now.time()
    }

    #[must_use]
    pub fn snapshot_context(&self, degraded: bool) -> SnapshotContext {
        SnapshotContext {
            city: self.city.clone(),
            day_offset: self.day,
            date: self.date(),
            degraded,
        }
    }
}

/// Daily snapshot plus the independently failing hourly half
#[derive(Debug)]
pub struct ProviderForecast {
    pub snapshot: DailySnapshot,
    pub hourly: Result<HourlySeries>,
}

/// One forecast source
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Whether the source is addressed by coordinates rather than city name
    fn needs_coordinates(&self) -> bool {
        false
    }

    async fn fetch_daily(&self, req: &ForecastRequest) -> Result<DailySnapshot>;

    async fn fetch_hourly(&self, req: &ForecastRequest) -> Result<HourlySeries>;

    /// Both halves; sources serving them from one document override this
    async fn fetch_forecast(&self, req: &ForecastRequest) -> Result<ProviderForecast> {
        let (snapshot, hourly) = futures::join!(self.fetch_daily(req), self.fetch_hourly(req));
        Ok(ProviderForecast {
            snapshot: snapshot?,
            hourly,
        })
    }
}

/// Shared HTTP client; the timeout here is the only per-call deadline
pub fn build_client(http: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(u64::from(http.timeout_seconds)))
        .user_agent(http.user_agent.clone())
        .build()
        .map_err(|e| MeteoError::config(format!("Failed to build HTTP client: {e}")))
}

/// Build the registry of enabled providers, in configured order
pub fn registry(config: &MeteoConfig, client: &Client) -> Result<Vec<Arc<dyn ForecastProvider>>> {
    let enabled = config
        .enabled_providers()
        .map_err(|e| MeteoError::config(e.to_string()))?;
    let urls = &config.providers;
    let open_meteo: Arc<dyn ForecastProvider> =
        Arc::new(OpenMeteo::new(client.clone(), urls.open_meteo_url.clone()));

    let mut providers: Vec<Arc<dyn ForecastProvider>> = Vec::with_capacity(enabled.len());
    for id in enabled {
        let provider: Arc<dyn ForecastProvider> = match id {
            ProviderId::OpenMeteo => open_meteo.clone(),
            ProviderId::IlMeteo => Arc::new(IlMeteo::new(client.clone(), urls.ilmeteo_url.clone())?),
            ProviderId::ThreeBMeteo => Arc::new(
                ThreeBMeteo::new(client.clone(), urls.three_b_meteo_url.clone())?
                    .with_fallback(open_meteo.clone()),
            ),
            ProviderId::MeteoIt => Arc::new(MeteoIt::new(client.clone(), urls.meteo_it_url.clone())?),
        };
        providers.push(provider);
    }
    Ok(providers)
}

/// Pick the condition vocabulary owned by `provider`
#[must_use]
pub fn vocabulary_for(provider: ProviderId) -> fn(&str) -> Option<Condition> {
    match provider {
        ProviderId::OpenMeteo => open_meteo::vocabulary,
        ProviderId::IlMeteo => ilmeteo::vocabulary,
        ProviderId::ThreeBMeteo => three_b_meteo::vocabulary,
        ProviderId::MeteoIt => meteo_it::vocabulary,
    }
}

/// URL path segment for a city: lowercase ASCII, words joined by `-`
pub fn city_slug(city: &str) -> Result<String> {
    let mut slug = String::with_capacity(city.len());
    for c in city.trim().to_lowercase().chars() {
        let c = match c {
            'à' | 'á' | 'â' | 'ä' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            c => c,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        return Err(MeteoError::location_not_found(format!("'{city}' is not a city name")));
    }
    Ok(slug)
}

/// Reject days beyond what a source can address
pub fn check_horizon(provider: ProviderId, day: DayOffset, max_days: u8) -> Result<()> {
    if day.days() > max_days {
        return Err(MeteoError::unsupported_range(format!(
            "{provider} forecasts {max_days} days ahead at most, {day} requested"
        )));
    }
    Ok(())
}

/// GET `url` and return the body of a 2xx answer
pub async fn fetch_text(client: &Client, provider: ProviderId, url: &str) -> Result<String> {
    debug!("{provider}: GET {url}");
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MeteoError::unreachable(format!(
            "{provider} answered HTTP {status} for {url}"
        )));
    }
    Ok(response.text().await?)
}

/// Parse `body` and run `parse` on the blocking pool
pub async fn parse_blocking<T, F>(provider: ProviderId, body: String, parse: F) -> Result<T>
where
    F: FnOnce(&Html) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let document = Html::parse_document(&body);
        parse(&document)
    })
    .await
    .map_err(|e| MeteoError::internal(format!("{provider} parser task failed: {e}")))?
}

/// Raw records of one scraped page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub summary: RawRecord,
    pub rows: Vec<RawRecord>,
    /// Rows were synthesized from coarse day-part blocks
    pub degraded: bool,
}

impl ScrapedPage {
    /// Normalized hourly candidates of every row
    #[must_use]
    pub fn candidates(&self, provider: ProviderId) -> Vec<HourlyCandidate> {
        self.rows
            .iter()
            .map(|row| normalize::normalize_hourly(row, provider))
            .collect()
    }

    /// Daily snapshot, falling back to the temperature range of the hourly
    /// entries that survive [`timeline::clean`]
    pub fn snapshot(&self, provider: ProviderId, req: &ForecastRequest) -> Result<DailySnapshot> {
        if !self.summary.has_weather_fields() && self.rows.is_empty() {
            return Err(MeteoError::extraction(format!(
                "{provider}: no forecast fields found for {} {}",
                req.city, req.day
            )));
        }
        let mut snapshot =
            normalize::normalize_daily(&self.summary, provider, &req.snapshot_context(self.degraded));
        if snapshot.min_temp.is_none() || snapshot.max_temp.is_none() {
            let cleaned = timeline::clean(self.candidates(provider), req.day, req.now_time());
            let slots = cleaned.iter().map(|entry| &entry.fields);
            if let Some((min, max)) = normalize::temperature_range(slots) {
                debug!("{provider}: daily min/max derived from hourly rows");
                snapshot.min_temp.get_or_insert(min);
                snapshot.max_temp.get_or_insert(max);
                snapshot.reliability = Reliability::from_completeness(
                    snapshot.populated_fields(),
                    DailySnapshot::FIELD_COUNT,
                )
                .capped(Reliability::Medium);
            }
        }
        Ok(snapshot)
    }

    /// Cleaned hourly series; zero extractable rows is an extraction failure
    pub fn series(&self, provider: ProviderId, req: &ForecastRequest) -> Result<HourlySeries> {
        if self.rows.is_empty() {
            return Err(MeteoError::extraction(format!(
                "{provider}: no hourly rows found for {} {}",
                req.city, req.day
            )));
        }
        let entries = timeline::clean(self.candidates(provider), req.day, req.now_time());
        Ok(HourlySeries::new(Attribution::direct(provider), entries))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Rome;

    /// Request for `city` at 2026-10-19 `hour:minute` Rome time
    pub fn request_at(city: &str, day: u8, hour: u32, minute: u32) -> ForecastRequest {
        let now = Rome.with_ymd_and_hms(2026, 10, 19, hour, minute, 0).unwrap();
        ForecastRequest::new(city, DayOffset::new(day), now)
    }
}
