//! Meteo.it adapter
//!
//! Days are addressed by calendar day of month (`?giorno=DD`). Pages for
//! later days often carry no hourly table, only four "fascia" boxes (night,
//! morning, afternoon, evening); those are reported as hourly entries at
//! 03:00, 09:00, 15:00 and 21:00 and the snapshot is marked as degraded.

use async_trait::async_trait;
use chrono::Datelike;
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
use crate::models::{Condition, DailySnapshot, DayPart, HourlySeries, ProviderId};
use crate::normalize::{RawField, RawRecord};

pub const HORIZON_DAYS: u8 = 9;

#[must_use]
pub fn vocabulary(text: &str) -> Option<Condition> {
    let phrase = crate::extraction::collapse_whitespace(&text.to_lowercase());
    let condition = match phrase.as_str() {
        "sereno" | "soleggiato" | "sole" => Condition::Clear,
        "poco nuvoloso" | "prevalentemente sereno" => Condition::MostlyClear,
        "parzialmente nuvoloso" | "variabile" => Condition::PartlyCloudy,
        "nuvoloso" | "molto nuvoloso" => Condition::Cloudy,
        "coperto" => Condition::Overcast,
        "nebbia" | "foschia" => Condition::Fog,
        "pioviggine" => Condition::Drizzle,
        "pioggia debole" | "deboli piogge" => Condition::LightRain,
        "pioggia" | "piogge sparse" => Condition::Rain,
        "pioggia forte" | "nubifragio" => Condition::HeavyRain,
        "rovescio" | "rovesci" | "rovesci di pioggia" => Condition::Showers,
        "temporale" | "temporali" => Condition::Thunderstorm,
        "pioggia e neve" | "nevischio" => Condition::Sleet,
        "neve" | "nevicate" => Condition::Snow,
        _ => return None,
    };
    Some(condition)
}

#[derive(Debug)]
struct Layout {
    summary: BlockLayout,
    hourly: TableLayout,
    day_parts: BlockLayout,
}

impl Layout {
    fn build() -> Result<Self> {
        let icons = ["img.icona-meteo", "img.weather-icon"];
        let summary = BlockLayout::new(&[".previsione-giornaliera", "#day-summary", ".day-summary"])?
            .field(RawField::MinTemp, texts(&[".t-min", ".min"])?)
            .field(RawField::MaxTemp, texts(&[".t-max", ".max"])?)
            .field(RawField::Description, texts(&[".testo-previsione", ".summary"])?)
            .field(RawField::IconAlt, attrs(&icons, "alt")?)
            .field(RawField::IconTitle, attrs(&icons, "title")?)
            .field(RawField::IconSrc, attrs(&icons, "src")?)
            .field(RawField::Wind, texts(&[".vento"])?)
            .field(RawField::Humidity, texts(&[".umidita"])?)
            .field(
                RawField::PrecipitationProb,
                vec![
                    Rule::text(".probabilita")?,
                    Rule::text_regex(".dettagli", r"[Pp]recipitazioni\D*(\d+)\s*%")?,
                ],
            );

        let hourly = TableLayout::new(&["table.previsioni-orarie", "#orarie table"], 5, 1)?
            .column(
                0,
                RawField::Label,
                vec![Rule::text_regex("td, th", r"(\d{1,2}(?:[:.]\d{2})?)")?],
            )
            .column(1, RawField::Description, texts(&[".descrizione"])?)
            .column(1, RawField::IconAlt, attrs(&["img"], "alt")?)
            .column(1, RawField::IconTitle, attrs(&["img"], "title")?)
            .column(1, RawField::IconSrc, attrs(&["img"], "src")?)
            .column(2, RawField::Temperature, texts(&["td"])?)
            .column(3, RawField::Precipitation, texts(&["td"])?)
            .column(4, RawField::Wind, texts(&["td"])?)
            .column(5, RawField::Humidity, texts(&["td"])?)
            .column(6, RawField::FeelsLike, texts(&["td"])?);

        let day_parts = BlockLayout::new(&["div.fascia", ".time-slot"])?
            .field(RawField::Label, texts(&[".fascia-nome", "h3"])?)
            .field(RawField::Temperature, texts(&[".temp"])?)
            .field(RawField::Description, texts(&[".descrizione"])?)
            .field(RawField::IconAlt, attrs(&["img"], "alt")?)
            .field(RawField::IconTitle, attrs(&["img"], "title")?)
            .field(RawField::IconSrc, attrs(&["img"], "src")?)
            .field(RawField::Precipitation, texts(&[".precipitazioni"])?)
            .field(RawField::PrecipitationProb, texts(&[".prob"])?)
            .field(RawField::Wind, texts(&[".vento"])?)
            .field(RawField::Humidity, texts(&[".umidita"])?);

        Ok(Self {
            summary,
            hourly,
            day_parts,
        })
    }

    /// Day-part boxes as hourly rows labelled with their bucket hour; used when
    /// the page has no hourly table or none of its rows carry data
    fn day_part_rows(&self, document: &Html) -> Vec<RawRecord> {
        self.day_parts
            .locate_all(document.root_element())
            .into_iter()
            .filter_map(|block| {
                let raw = self.day_parts.read(block);
                let part = raw.get(RawField::Label).and_then(DayPart::from_italian)?;
                Some(raw.with(RawField::Label, part.label()))
            })
            .collect()
    }

    fn scrape(&self, document: &Html) -> Result<ScrapedPage> {
        let root = document.root_element();
        let summary = self.summary.extract(root);
        Ok(match self.hourly.extract(root)? {
            Some(rows) if !rows.is_empty() => ScrapedPage {
                summary,
                rows,
                degraded: false,
            },
            _ => ScrapedPage {
                summary,
                rows: self.day_part_rows(document),
                degraded: true,
            },
        })
    }
}

/// Adapter for `meteo.it`
#[derive(Debug, Clone)]
pub struct MeteoIt {
    client: Client,
    base_url: String,
    layout: Arc<Layout>,
}

impl MeteoIt {
    pub fn new(client: Client, base_url: String) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            layout: Arc::new(Layout::build()?),
        })
    }

    fn page_url(&self, req: &ForecastRequest) -> Result<String> {
        let slug = city_slug(&req.city)?;
        Ok(format!("{}/{slug}?giorno={:02}", self.base_url, req.date().day()))
    }

    async fn scrape(&self, req: &ForecastRequest) -> Result<ScrapedPage> {
        check_horizon(ProviderId::MeteoIt, req.day, HORIZON_DAYS)?;
        let url = self.page_url(req)?;
        let body = fetch_text(&self.client, ProviderId::MeteoIt, &url).await?;
        let layout = Arc::clone(&self.layout);
        let page = parse_blocking(ProviderId::MeteoIt, body, move |doc| layout.scrape(doc)).await?;
        if page.degraded {
            debug!("Meteo.it: no usable hourly table on {url}, {} day-part buckets", page.rows.len());
        }
        Ok(page)
    }
}

#[async_trait]
impl ForecastProvider for MeteoIt {
    fn id(&self) -> ProviderId {
        ProviderId::MeteoIt
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{HourlyEntry, Reliability};
    use crate::providers::test_support::request_at;
    use rstest::rstest;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = include_str!("../../tests/fixtures/meteo_it_milano.html");

    const WITH_TABLE: &str = r#"
        <div class="previsione-giornaliera"><span class="t-min">6°</span><span class="t-max">12°</span>
          <p class="testo-previsione">Coperto</p></div>
        <table class="previsioni-orarie">
          <tr><th>Ora</th><th></th><th>T</th><th>Prec</th><th>Vento</th></tr>
          <tr><td>10:00</td><td><img alt="coperto"></td><td>8°</td><td>0 mm</td><td>NE 5 km/h</td></tr>
          <tr><td>11:00</td><td><img alt="pioggia debole"></td><td>9°</td><td>0,3 mm</td><td>NE 6 km/h</td></tr>
        </table>
        <div class="fascia"><h3>Mattina</h3><span class="temp">7°</span></div>
    "#;

    const EMPTY_TABLE: &str = r#"
        <table class="previsioni-orarie">
          <tr><th>Ora</th><th></th><th>T</th><th>Prec</th><th>Vento</th></tr>
          <tr><td colspan="5">Dati orari non disponibili</td></tr>
        </table>
        <div class="fascia"><h3>Notte</h3><span class="temp">5°</span></div>
        <div class="fascia"><h3>Mattina</h3><span class="temp">9°</span></div>
        <div class="fascia"><h3>Pomeriggio</h3><span class="temp">13°</span></div>
        <div class="fascia"><h3>Sera</h3><span class="temp">8°</span></div>
    "#;

    async fn serve(page: &str, giorno: &str) -> (MockServer, MeteoIt) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meteo/milano"))
            .and(query_param("giorno", giorno))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .expect(1)
            .mount(&server)
            .await;
        let provider = MeteoIt::new(Client::new(), format!("{}/meteo", server.uri())).unwrap();
        (server, provider)
    }

    #[rstest]
    #[case("Prevalentemente sereno", Some(Condition::MostlyClear))]
    #[case("rovesci di pioggia", Some(Condition::Showers))]
    #[case("nubi sparse", None)]
    fn test_vocabulary(#[case] text: &str, #[case] expected: Option<Condition>) {
        assert_eq!(vocabulary(text), expected);
    }

    #[tokio::test]
    async fn test_day_parts_become_buckets() {
        // 2026-10-19 + 2 days
        let (_server, provider) = serve(PAGE, "21").await;
        let forecast = provider.fetch_forecast(&request_at("Milano", 2, 10, 0)).await.unwrap();

        let hourly = forecast.hourly.unwrap();
        let labels: Vec<String> = hourly.entries.iter().map(HourlyEntry::time_label).collect();
        assert_eq!(labels, vec!["03:00", "09:00", "15:00", "21:00"]);
        assert_eq!(hourly.entries[2].fields.condition, Condition::Showers);
        assert_eq!(hourly.entries[0].fields.condition, Condition::Fog);

        let snapshot = forecast.snapshot;
        assert_eq!(snapshot.min_temp, Some(7.0));
        assert_eq!(snapshot.max_temp, Some(15.0));
        assert!(snapshot.reliability <= Reliability::Medium);
    }

    #[tokio::test]
    async fn test_today_buckets_are_filtered() {
        let (_server, provider) = serve(PAGE, "19").await;
        let hourly = provider.fetch_hourly(&request_at("Milano", 0, 10, 0)).await.unwrap();
        let hours: Vec<u8> = hourly.entries.iter().map(|e| e.hour).collect();
        assert_eq!(hours, vec![15, 21]);
    }

    #[tokio::test]
    async fn test_hourly_table_takes_precedence_over_day_parts() {
        let (_server, provider) = serve(WITH_TABLE, "20").await;
        let forecast = provider.fetch_forecast(&request_at("Milano", 1, 10, 0)).await.unwrap();
        let hourly = forecast.hourly.unwrap();
        assert_eq!(hourly.entries.len(), 2);
        assert_eq!(hourly.entries[1].fields.condition, Condition::LightRain);
        assert_eq!(forecast.snapshot.condition, Condition::Overcast);
        assert_eq!(forecast.snapshot.min_temp, Some(6.0));
    }

    #[tokio::test]
    async fn test_table_without_data_rows_falls_back_to_day_parts() {
        let (_server, provider) = serve(EMPTY_TABLE, "20").await;
        let forecast = provider.fetch_forecast(&request_at("Milano", 1, 10, 0)).await.unwrap();

        let hourly = forecast.hourly.unwrap();
        let hours: Vec<u8> = hourly.entries.iter().map(|e| e.hour).collect();
        assert_eq!(hours, vec![3, 9, 15, 21]);
        assert_eq!(hourly.entries[2].fields.temperature, Some(13.0));
        assert!(forecast.snapshot.reliability <= Reliability::Medium);
        assert_eq!(forecast.snapshot.min_temp, Some(5.0));
    }

    #[tokio::test]
    async fn test_beyond_horizon() {
        let provider = MeteoIt::new(Client::new(), "http://127.0.0.1:9/meteo".into()).unwrap();
        let err = provider.fetch_hourly(&request_at("Milano", 10, 10, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRange);
    }
}
