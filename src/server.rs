use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderValue,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    features::FlightFeatures,
    model::{ModelMetadata, ModelRegistry, PredictionResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
}

#[derive(Serialize)]
struct StatusMessage {
    message: &'static str,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> anyhow::Result<Router> {
    let cors = cors_layer(&config.cors_allowed_origin)?;
    let state = AppState { config, registry };

    Ok(Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/metadata", get(metadata))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Only one origin may call with credentials; methods and headers are
/// mirrored back since wildcards are not allowed alongside credentials.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .with_context(|| format!("invalid CORS origin '{origin}'"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

async fn root() -> Json<StatusMessage> {
    Json(StatusMessage {
        message: "API is up and running!",
    })
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<FlightFeatures>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ServiceError> {
    let Json(features) = payload.map_err(|rejection| ServiceError::Validation {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;

    info!(?features, "prediction request");

    if state.config.strict_one_hot {
        features.validate_one_hot()?;
    }

    let response = state.registry.predict(features).await?;
    Ok(Json(response))
}

async fn metadata(State(state): State<AppState>) -> Json<ModelMetadata> {
    Json(state.registry.metadata())
}
