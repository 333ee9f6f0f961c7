//! 3BMeteo adapter
//!
//! Days are addressed by a numeric path segment. The site publishes hourly
//! tables only for the first three days; later hourly requests are handed to
//! a fallback provider and the answer is re-attributed so callers can see
//! who actually served it.

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::markup::{BlockLayout, TableLayout, attrs, texts};
use super::{
    ForecastProvider, ForecastRequest, ProviderForecast, ScrapedPage, check_horizon, city_slug,
    fetch_text, parse_blocking,
};
use crate::Result;
use crate::error::MeteoError;
use crate::extraction::Rule;
use crate::models::{Condition, DailySnapshot, HourlySeries, ProviderId};
use crate::normalize::RawField;

pub const DAILY_HORIZON_DAYS: u8 = 6;
pub const HOURLY_HORIZON_DAYS: u8 = 2;

/// Condition phrases used in the site's short descriptions
#[must_use]
pub fn vocabulary(text: &str) -> Option<Condition> {
    let phrase = crate::extraction::collapse_whitespace(&text.to_lowercase());
    let condition = match phrase.as_str() {
        "sereno" | "soleggiato" => Condition::Clear,
        "sereno o poco nuvoloso" | "poco nuvoloso" | "velature lievi" => Condition::MostlyClear,
        "parzialmente nuvoloso" | "nubi sparse" | "velature estese" => Condition::PartlyCloudy,
        "nuvoloso" | "molto nuvoloso" | "nubi basse" => Condition::Cloudy,
        "coperto" | "cielo coperto" => Condition::Overcast,
        "nebbia" | "foschia" | "nebbia a banchi" => Condition::Fog,
        "pioviggine" | "pioviggine e schiarite" => Condition::Drizzle,
        "pioggia debole" | "pioggia debole e schiarite" => Condition::LightRain,
        "pioggia" | "pioggia moderata" => Condition::Rain,
        "pioggia forte" | "pioggia intensa" => Condition::HeavyRain,
        "pioggia e schiarite" | "rovesci" | "possibili rovesci" => Condition::Showers,
        "temporale" | "temporale e schiarite" | "temporale forte" | "possibili temporali" => {
            Condition::Thunderstorm
        }
        "pioggia mista a neve" | "nevischio" => Condition::Sleet,
        "neve debole" | "neve moderata" | "neve forte" | "neve e schiarite" => Condition::Snow,
        _ => return None,
    };
    Some(condition)
}

#[derive(Debug)]
struct Layout {
    summary: BlockLayout,
    hourly: TableLayout,
}

impl Layout {
    fn build() -> Result<Self> {
        let summary = BlockLayout::new(&[".day-forecast", "#previsione-giorno", ".navDays .active"])?
            .field(
                RawField::MinTemp,
                vec![
                    Rule::text(".tmin")?,
                    Rule::text(".temperature .min")?,
                    Rule::text_regex(".temperature", r"(-?\d+)\s*°?\s*/")?,
                ],
            )
            .field(
                RawField::MaxTemp,
                vec![
                    Rule::text(".tmax")?,
                    Rule::text(".temperature .max")?,
                    Rule::text_regex(".temperature", r"/\s*(-?\d+)")?,
                ],
            )
            .field(RawField::Description, texts(&[".descrizione-sintetica", ".forecast-text"])?)
            .field(RawField::IconAlt, attrs(&["img.icon", "img.icona"], "alt")?)
            .field(RawField::IconTitle, attrs(&["img.icon", "img.icona"], "title")?)
            .field(RawField::IconSrc, attrs(&["img.icon", "img.icona"], "src")?)
            .field(RawField::Wind, texts(&[".wind", ".vento"])?)
            .field(
                RawField::Humidity,
                vec![
                    Rule::text(".humidity")?,
                    Rule::text_regex(".info", r"[Uu]midit[aà]\D*(\d+)")?,
                ],
            )
            .field(
                RawField::PrecipitationProb,
                vec![
                    Rule::text(".rain-prob")?,
                    Rule::text_regex(".info", r"[Pp]ioggia\D*(\d+)\s*%")?,
                ],
            );

        let hourly = TableLayout::new(&["table.table-previsioni-ora", "#orari table"], 5, 1)?
            .column(
                0,
                RawField::Label,
                vec![
                    Rule::text(".hour")?,
                    Rule::text_regex("td, th", r"(\d{1,2}(?:[:.]\d{2})?)")?,
                ],
            )
            .column(1, RawField::Description, texts(&[".desc"])?)
            .column(1, RawField::IconAlt, attrs(&["img"], "alt")?)
            .column(1, RawField::IconTitle, attrs(&["img"], "title")?)
            .column(1, RawField::IconSrc, attrs(&["img"], "src")?)
            .column(2, RawField::Temperature, texts(&[".temp", "td"])?)
            .column(3, RawField::Precipitation, texts(&[".prec", "td"])?)
            .column(4, RawField::WindDirection, vec![Rule::attr(".dir", "title")?, Rule::text(".dir")?])
            .column(4, RawField::WindSpeed, texts(&[".speed"])?)
            .column(4, RawField::Wind, texts(&["td"])?)
            .column(5, RawField::Humidity, texts(&["td"])?);

        Ok(Self { summary, hourly })
    }

    fn scrape(&self, document: &Html) -> Result<ScrapedPage> {
        let root = document.root_element();
        Ok(ScrapedPage {
            summary: self.summary.extract(root),
            rows: self.hourly.extract(root)?.unwrap_or_default(),
            degraded: false,
        })
    }
}

/// Adapter for `3bmeteo.com`
#[derive(Clone)]
pub struct ThreeBMeteo {
    client: Client,
    base_url: String,
    layout: Arc<Layout>,
    fallback: Option<Arc<dyn ForecastProvider>>,
}

impl fmt::Debug for ThreeBMeteo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreeBMeteo")
            .field("base_url", &self.base_url)
            .field("fallback", &self.fallback.as_ref().map(|p| p.id()))
            .finish()
    }
}

impl ThreeBMeteo {
    pub fn new(client: Client, base_url: String) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            layout: Arc::new(Layout::build()?),
            fallback: None,
        })
    }

    /// Provider answering hourly requests beyond the site's hourly horizon
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn ForecastProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn page_url(&self, req: &ForecastRequest) -> Result<String> {
        let slug = city_slug(&req.city)?;
        Ok(match req.day.days() {
            0 => format!("{}/{slug}", self.base_url),
            n => format!("{}/{slug}/{n}", self.base_url),
        })
    }

    async fn scrape(&self, req: &ForecastRequest) -> Result<ScrapedPage> {
        check_horizon(ProviderId::ThreeBMeteo, req.day, DAILY_HORIZON_DAYS)?;
        let url = self.page_url(req)?;
        let body = fetch_text(&self.client, ProviderId::ThreeBMeteo, &url).await?;
        let layout = Arc::clone(&self.layout);
        let page = parse_blocking(ProviderId::ThreeBMeteo, body, move |doc| layout.scrape(doc)).await?;
        debug!("3BMeteo: {} hourly rows on {url}", page.rows.len());
        Ok(page)
    }

    fn serves_hourly(req: &ForecastRequest) -> bool {
        req.day.days() <= HOURLY_HORIZON_DAYS
    }

    async fn delegate_hourly(&self, req: &ForecastRequest) -> Result<HourlySeries> {
        let Some(fallback) = &self.fallback else {
            return Err(MeteoError::unsupported_range(format!(
                "3BMeteo publishes hourly data {HOURLY_HORIZON_DAYS} days ahead at most, {} requested",
                req.day
            )));
        };
        info!(
            "3BMeteo: hourly {} beyond horizon, delegating to {}",
            req.day,
            fallback.id()
        );
        let series = fallback.fetch_hourly(req).await?;
        Ok(series.delegated_to(ProviderId::ThreeBMeteo))
    }
}

#[async_trait]
impl ForecastProvider for ThreeBMeteo {
    fn id(&self) -> ProviderId {
        ProviderId::ThreeBMeteo
    }

    /// Only the delegated hourly path is coordinate-addressed
    fn needs_coordinates(&self) -> bool {
        self.fallback.as_ref().is_some_and(|f| f.needs_coordinates())
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_daily(&self, req: &ForecastRequest) -> Result<DailySnapshot> {
        self.scrape(req).await?.snapshot(self.id(), req)
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_hourly(&self, req: &ForecastRequest) -> Result<HourlySeries> {
        if Self::serves_hourly(req) {
            self.scrape(req).await?.series(self.id(), req)
        } else {
            self.delegate_hourly(req).await
        }
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_forecast(&self, req: &ForecastRequest) -> Result<ProviderForecast> {
        if Self::serves_hourly(req) {
            let page = self.scrape(req).await?;
            return Ok(ProviderForecast {
                snapshot: page.snapshot(self.id(), req)?,
                hourly: page.series(self.id(), req),
            });
        }
        let (page, hourly) = futures::join!(self.scrape(req), self.delegate_hourly(req));
        Ok(ProviderForecast {
            snapshot: page?.snapshot(self.id(), req)?,
            hourly,
        })
    }
}
