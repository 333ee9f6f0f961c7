use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::aggregator::Aggregator;
use crate::api;

pub fn app(aggregator: Arc<Aggregator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(aggregator))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run(aggregator: Arc<Aggregator>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://localhost:{}", port);
    axum::serve(listener, app(aggregator))
        .await
        .context("Web server stopped unexpectedly")
}
