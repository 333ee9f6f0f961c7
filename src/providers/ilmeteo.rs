//! IlMeteo adapter
//!
//! Days are addressed by name: today is the bare city page, then `domani`,
//! `dopodomani` and `giorno-N`. One page carries both the daily summary and
//! the hourly table, so [`ForecastProvider::fetch_forecast`] needs a single
//! request. When the summary card has no min/max, they are derived from the
//! hourly rows.

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::markup::{BlockLayout, TableLayout, attrs, texts};
use super::{
    ForecastProvider, ForecastRequest, ProviderForecast, ScrapedPage, check_horizon, city_slug,
    fetch_text, parse_blocking,
};
use crate::Result;
use crate::extraction::Rule;
use crate::models::{Condition, DailySnapshot, DayOffset, HourlySeries, ProviderId};
use crate::normalize::RawField;

pub const HORIZON_DAYS: u8 = 6;

/// Exact condition phrases used by the site
#[must_use]
pub fn vocabulary(text: &str) -> Option<Condition> {
    let phrase = crate::extraction::collapse_whitespace(&text.to_lowercase());
    let condition = match phrase.as_str() {
        "sereno" | "soleggiato" | "sole" => Condition::Clear,
        "poco nuvoloso" | "velature" | "velature sparse" => Condition::MostlyClear,
        "nubi sparse" | "parz nuvoloso" | "parzialmente nuvoloso" => Condition::PartlyCloudy,
        "nuvoloso" | "molto nuvoloso" => Condition::Cloudy,
        "coperto" => Condition::Overcast,
        "nebbia" | "foschia" | "nebbia in banchi" => Condition::Fog,
        "pioviggine" => Condition::Drizzle,
        "pioggia debole" | "pioggia debole e schiarite" => Condition::LightRain,
        "pioggia" | "pioggia moderata" => Condition::Rain,
        "pioggia forte" | "pioggia intensa" => Condition::HeavyRain,
        "pioggia e schiarite" | "rovesci" | "rovesci e schiarite" => Condition::Showers,
        "temporale" | "temporale e schiarite" | "temporale forte" => Condition::Thunderstorm,
        "pioggia mista neve" | "nevischio" => Condition::Sleet,
        "neve" | "neve debole" | "neve forte" | "neve e schiarite" => Condition::Snow,
        _ => return None,
    };
    Some(condition)
}

/// Path suffix for a day offset
#[must_use]
pub fn day_path(day: DayOffset) -> String {
    match day.days() {
        0 => String::new(),
        1 => "domani".to_string(),
        2 => "dopodomani".to_string(),
        n => format!("giorno-{n}"),
    }
}

#[derive(Debug)]
struct Layout {
    summary: BlockLayout,
    hourly: TableLayout,
}

impl Layout {
    fn build() -> Result<Self> {
        let summary = BlockLayout::new(&[".previsione-giorno", "#forecast-summary", ".day-summary"])?
            .field(
                RawField::MinTemp,
                vec![
                    Rule::text(".tmin")?,
                    Rule::text(".temp-min")?,
                    Rule::text_regex(".temperature", r"[Mm]in\.?\s*(-?\d+)")?,
                ],
            )
            .field(
                RawField::MaxTemp,
                vec![
                    Rule::text(".tmax")?,
                    Rule::text(".temp-max")?,
                    Rule::text_regex(".temperature", r"[Mm]ax\.?\s*(-?\d+)")?,
                ],
            )
            .field(RawField::Description, texts(&[".descrizione", ".summary-text", "p.desc"])?)
            .field(RawField::IconAlt, attrs(&["img.icon-day", "img.weather-icon"], "alt")?)
            .field(RawField::IconTitle, attrs(&["img.icon-day", "img.weather-icon"], "title")?)
            .field(RawField::IconSrc, attrs(&["img.icon-day", "img.weather-icon"], "src")?)
            .field(
                RawField::Wind,
                vec![
                    Rule::text(".vento")?,
                    Rule::text(".wind")?,
                    Rule::text_regex(".details", r"[Vv]ento:?\s*([^|]+?km/h)")?,
                ],
            )
            .field(
                RawField::Humidity,
                vec![
                    Rule::text(".umidita")?,
                    Rule::text_regex(".details", r"[Uu]midit[aà]\D*(\d+)")?,
                ],
            )
            .field(
                RawField::PrecipitationProb,
                vec![
                    Rule::text(".prob-pioggia")?,
                    Rule::text_regex(".details", r"[Pp]robabilit[aà][^\d]*(\d+)\s*%")?,
                ],
            );

        let hourly = TableLayout::new(&["table.datatable", "table#previsione-oraria", "table.hourly"], 5, 1)?
            .column(
                0,
                RawField::Label,
                vec![
                    Rule::text(".ora")?,
                    Rule::text_regex("td, th", r"(\d{1,2}(?:[:.]\d{2})?)")?,
                ],
            )
            .column(1, RawField::Description, texts(&[".descr", "span"])?)
            .column(1, RawField::IconAlt, attrs(&["img"], "alt")?)
            .column(1, RawField::IconTitle, attrs(&["img"], "title")?)
            .column(1, RawField::IconSrc, vec![Rule::attr("img", "src")?, Rule::attr("img", "data-src")?])
            .column(2, RawField::Temperature, texts(&[".temp", "td"])?)
            .column(3, RawField::Precipitation, texts(&[".prec", "td"])?)
            .column(4, RawField::Wind, texts(&[".vento", "td"])?)
            .column(5, RawField::Humidity, texts(&["td"])?)
            .column(6, RawField::FeelsLike, texts(&["td"])?);

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

/// Adapter for `ilmeteo.it`
#[derive(Debug, Clone)]
pub struct IlMeteo {
    client: Client,
    base_url: String,
    layout: Arc<Layout>,
}

impl IlMeteo {
    /// Compiles the page layout; an invalid selector is a configuration error
    pub fn new(client: Client, base_url: String) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            layout: Arc::new(Layout::build()?),
        })
    }

    fn page_url(&self, req: &ForecastRequest) -> Result<String> {
        let slug = city_slug(&req.city)?;
        let suffix = day_path(req.day);
        Ok(if suffix.is_empty() {
            format!("{}/{slug}", self.base_url)
        } else {
            format!("{}/{slug}/{suffix}", self.base_url)
        })
    }

    async fn scrape(&self, req: &ForecastRequest) -> Result<ScrapedPage> {
        check_horizon(ProviderId::IlMeteo, req.day, HORIZON_DAYS)?;
        let url = self.page_url(req)?;
        let body = fetch_text(&self.client, ProviderId::IlMeteo, &url).await?;
        let layout = Arc::clone(&self.layout);
        let page = parse_blocking(ProviderId::IlMeteo, body, move |doc| layout.scrape(doc)).await?;
        debug!("IlMeteo: {} hourly rows on {url}", page.rows.len());
        Ok(page)
    }
}

#[async_trait]
impl ForecastProvider for IlMeteo {
    fn id(&self) -> ProviderId {
        ProviderId::IlMeteo
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_daily(&self, req: &ForecastRequest) -> Result<DailySnapshot> {
        self.scrape(req).await?.snapshot(self.id(), req)
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_hourly(&self, req: &ForecastRequest) -> Result<HourlySeries> {
        self.scrape(req).await?.series(self.id(), req)
    }

    #[instrument(skip_all, fields(city = %req.city, day = %req.day))]
    async fn fetch_forecast(&self, req: &ForecastRequest) -> Result<ProviderForecast> {
        let page = self.scrape(req).await?;
        Ok(ProviderForecast {
            snapshot: page.snapshot(self.id(), req)?,
            hourly: page.series(self.id(), req),
        })
    }
}
