use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::models::{AggregateResponse, DayOffset, HourlyReport, ProviderId};

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub city: String,
    #[serde(default)]
    pub day: u8,
}

#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    pub provider: String,
    pub city: String,
    #[serde(default)]
    pub day: u8,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiProvider {
    pub id: String,
    pub name: String,
}

impl From<ProviderId> for ApiProvider {
    fn from(id: ProviderId) -> Self {
        Self {
            id: id.as_str().to_string(),
            name: id.display_name().to_string(),
        }
    }
}

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/providers", get(get_providers))
        .route("/forecast", get(get_forecast))
        .route("/hourly", get(get_hourly))
        .with_state(aggregator)
}

async fn get_providers(State(aggregator): State<Arc<Aggregator>>) -> Json<Vec<ApiProvider>> {
    Json(aggregator.provider_ids().map(ApiProvider::from).collect())
}

async fn get_forecast(
    State(aggregator): State<Arc<Aggregator>>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<AggregateResponse>, StatusCode> {
    let city = query.city.trim();
    if city.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(aggregator.run(city, DayOffset::new(query.day)).await))
}

async fn get_hourly(
    State(aggregator): State<Arc<Aggregator>>,
    Query(query): Query<HourlyQuery>,
) -> Result<Json<HourlyReport>, StatusCode> {
    let city = query.city.trim();
    if city.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let provider = ProviderId::from_str(&query.provider).map_err(|_| StatusCode::NOT_FOUND)?;
    if aggregator.provider(provider).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(
        aggregator
            .hourly(provider, city, DayOffset::new(query.day))
            .await,
    ))
}
