//! Price prediction service for real-estate listings.
//!
//! Artifacts are loaded once at startup ([`load_artifacts`]); if anything is
//! missing or inconsistent the process never starts listening. Requests then
//! flow through [`handler::RequestOrchestrator`].

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use prometheus::Registry;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

pub mod config;
pub mod derive;
pub mod errors;
pub mod features;
pub mod handler;
pub mod median;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod telemetry;
pub mod types;
pub mod validate;

pub use config::Config;
use errors::{ModelLoadError, RequestError};
use features::{FeatureAssembler, FeatureSchema};
use handler::RequestOrchestrator;
use metrics::MetricsRecorder;
use model::PredictionEngine;
use preprocess::StandardScaler;
use types::PredictionResponse;

/// Load the transform and model, check both against the feature schema, and
/// run one warmup prediction.
pub fn load_artifacts(config: &Config) -> Result<(FeatureAssembler, PredictionEngine), ModelLoadError> {
    let schema = FeatureSchema::standard()?;
    let scaler = StandardScaler::load(&config.pipeline_path)?;
    let assembler = FeatureAssembler::new(schema, scaler)?;
    let engine = PredictionEngine::load(&config.model_path, assembler.schema())?;

    let warm = engine
        .predict(&assembler.neutral_vector())
        .map_err(ModelLoadError::Warmup)?;
    tracing::info!(
        in_dim = engine.in_dim(),
        features = ?assembler.schema().selected().iter().map(|c| c.name()).collect::<Vec<_>>(),
        warmup = warm,
        "warmup forward ok"
    );
    Ok((assembler, engine))
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RequestOrchestrator>,
    pub metrics: Arc<MetricsRecorder>,
    pub endpoint: Arc<str>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let (assembler, engine) = load_artifacts(config).context("failed to load model artifacts")?;
        let metrics = Arc::new(
            MetricsRecorder::new(Registry::new(), config.median_window)
                .context("failed to register metrics")?,
        );
        let orchestrator = RequestOrchestrator::new(
            Arc::new(assembler),
            Arc::new(engine),
            Arc::clone(&metrics),
            config.request_timeout,
        );
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            metrics,
            endpoint: Arc::from(config.endpoint.as_str()),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&state.endpoint, post(predict_price))
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

// `user_id` normally arrives as a query parameter with the listing as the
// JSON body. Without it, the body itself must be the full
// `{user_id, model_params}` envelope. Unparseable bodies become `null` and
// fail validation like any other non-mapping.
async fn predict_price(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, RequestError> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let raw = match query.get("user_id") {
        Some(user_id) => json!({ "user_id": user_id, "model_params": body }),
        None => body,
    };
    state
        .orchestrator
        .handle(&state.endpoint, raw)
        .await
        .map(Json)
}

async fn render_metrics(State(state): State<AppState>) -> Result<String, (StatusCode, String)> {
    state.metrics.render().map_err(|e| {
        tracing::error!(error = %e, "failed to encode metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics".to_string())
    })
}
