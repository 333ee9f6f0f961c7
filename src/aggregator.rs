//! Fan-out over every registered provider with per-provider failure isolation

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::Result;
use crate::config::MeteoConfig;
use crate::error::MeteoError;
use crate::geocoding::{Geocode, OpenMeteoGeocoder};
use crate::models::{
    AggregateResponse, DayOffset, HourlyReport, Location, ProviderFailure, ProviderId,
    ProviderResult,
};
use crate::providers::{self, ForecastProvider, ForecastRequest, ProviderForecast};

/// Geocoding outcome awaited only by the tasks that need coordinates
type PendingLocation = Shared<BoxFuture<'static, Result<Location>>>;

/// Runs one (city, day) request against every registered provider
pub struct Aggregator {
    providers: Vec<Arc<dyn ForecastProvider>>,
    geocoder: Arc<dyn Geocode>,
    timezone: Tz,
}

impl Aggregator {
    #[must_use]
    pub fn new(
        providers: Vec<Arc<dyn ForecastProvider>>,
        geocoder: Arc<dyn Geocode>,
        timezone: Tz,
    ) -> Self {
        Self {
            providers,
            geocoder,
            timezone,
        }
    }

    /// Default registry with one shared HTTP client
    pub fn from_config(config: &MeteoConfig) -> Result<Self> {
        let client = providers::build_client(&config.http)?;
        let registry = providers::registry(config, &client)?;
        let geocoder = Arc::new(OpenMeteoGeocoder::new(client, config.geocoding.clone()));
        let timezone = config
            .reference_timezone()
            .map_err(|e| MeteoError::config(e.to_string()))?;
        info!(
            "Aggregator ready with {} providers ({timezone})",
            registry.len()
        );
        Ok(Self::new(registry, geocoder, timezone))
    }

    /// Registered providers in registration order
    pub fn provider_ids(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.iter().map(|p| p.id())
    }

    #[must_use]
    pub fn provider(&self, id: ProviderId) -> Option<&Arc<dyn ForecastProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Current wall-clock time in the reference timezone
    #[must_use]
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    pub async fn run(&self, city: &str, day: DayOffset) -> AggregateResponse {
        self.run_at(city, day, self.now()).await
    }

    /// Aggregate forecast as seen at `now`; never fails as a whole
    ///
    /// Every adapter task starts right away. Geocoding runs at most once, the
    /// first time a coordinate-addressed adapter asks for it.
    #[instrument(skip(self, now))]
    pub async fn run_at(&self, city: &str, day: DayOffset, now: DateTime<Tz>) -> AggregateResponse {
        let base = Arc::new(ForecastRequest::new(city, day, now));
        let location = self.pending_location(city);

        let tasks = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let base = Arc::clone(&base);
            let pending = provider.needs_coordinates().then(|| location.clone());
            tokio::spawn(async move {
                let req = match pending {
                    Some(geocoding) => {
                        Arc::new(ForecastRequest::clone(&base).with_geocoding(geocoding.await))
                    }
                    None => base,
                };
                provider.fetch_forecast(&req).await
            })
        });
        let outcomes = join_all(tasks).await;

        let results: Vec<ProviderResult> = self
            .providers
            .iter()
            .zip(outcomes)
            .map(|(provider, joined)| {
                let id = provider.id();
                let outcome = joined
                    .map_err(|e| MeteoError::internal(format!("{id} task failed: {e}")))
                    .and_then(|forecast| forecast);
                settle(id, outcome)
            })
            .collect();

        let response = AggregateResponse {
            city: city.to_string(),
            location: location.peek().and_then(|g| g.as_ref().ok()).cloned(),
            day_offset: day,
            results,
            timestamp: Utc::now(),
        };
        info!(
            "{city} {day}: {}/{} providers answered",
            response.successes(),
            response.results.len()
        );
        response
    }

    pub async fn hourly(&self, provider: ProviderId, city: &str, day: DayOffset) -> HourlyReport {
        self.hourly_at(provider, city, day, self.now()).await
    }

    /// Hour-by-hour breakdown from a single provider
    #[instrument(skip(self, now))]
    pub async fn hourly_at(
        &self,
        provider: ProviderId,
        city: &str,
        day: DayOffset,
        now: DateTime<Tz>,
    ) -> HourlyReport {
        let Some(adapter) = self.provider(provider).cloned() else {
            let err = MeteoError::config(format!("{provider} is not enabled"));
            return HourlyReport::from_error(city, day, provider, &err);
        };
        let req = self
            .request_for(city, day, now, adapter.needs_coordinates())
            .await;

        let outcome = tokio::spawn(async move { adapter.fetch_hourly(&req).await })
            .await
            .map_err(|e| MeteoError::internal(format!("{provider} task failed: {e}")))
            .and_then(|series| series);

        match outcome {
            Ok(series) => HourlyReport::from_series(city, day, series),
            Err(e) => {
                warn!(provider = %provider, kind = %e.kind(), "hourly request failed: {e}");
                HourlyReport::from_error(city, day, provider, &e)
            }
        }
    }

    /// Lazy shared geocoding of `city`; nothing is sent until first polled
    fn pending_location(&self, city: &str) -> PendingLocation {
        let geocoder = Arc::clone(&self.geocoder);
        let query = city.to_string();
        async move {
            let outcome = geocoder.resolve(&query).await;
            if let Err(e) = &outcome {
                warn!("Geocoding '{query}' failed: {e}");
            }
            outcome
        }
        .boxed()
        .shared()
    }

    /// Request for a single adapter, geocoded first when it needs coordinates
    async fn request_for(
        &self,
        city: &str,
        day: DayOffset,
        now: DateTime<Tz>,
        geocode: bool,
    ) -> ForecastRequest {
        let req = ForecastRequest::new(city, day, now);
        if !geocode {
            return req;
        }
        req.with_geocoding(self.pending_location(city).await)
    }
}

fn settle(provider: ProviderId, outcome: Result<ProviderForecast>) -> ProviderResult {
    match outcome {
        Ok(ProviderForecast { snapshot, hourly }) => {
            let (hourly, hourly_error) = match hourly {
                Ok(series) => (series.entries, None),
                Err(e) => {
                    warn!(provider = %provider, "hourly half failed, keeping daily snapshot: {e}");
                    (Vec::new(), Some(ProviderFailure::from_error(provider, &e)))
                }
            };
            ProviderResult::Success {
                snapshot,
                hourly,
                hourly_error,
            }
        }
        Err(e) => {
            warn!(provider = %provider, kind = %e.kind(), "{e}");
            ProviderResult::Error(ProviderFailure::from_error(provider, &e))
        }
    }
}
