//! Request pipeline: validate, derive, assemble, predict, record, respond.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::derive::FeatureDeriver;
use crate::errors::{InferenceError, RequestError};
use crate::features::FeatureAssembler;
use crate::metrics::MetricsRecorder;
use crate::model::PredictionEngine;
use crate::types::{ListingParams, PredictionResponse};
use crate::validate::SchemaValidator;

pub struct RequestOrchestrator {
    validator: SchemaValidator,
    deriver: FeatureDeriver,
    assembler: Arc<FeatureAssembler>,
    engine: Arc<PredictionEngine>,
    metrics: Arc<MetricsRecorder>,
    timeout: Duration,
}

impl RequestOrchestrator {
    pub fn new(
        assembler: Arc<FeatureAssembler>,
        engine: Arc<PredictionEngine>,
        metrics: Arc<MetricsRecorder>,
        timeout: Duration,
    ) -> Self {
        Self {
            validator: SchemaValidator,
            deriver: FeatureDeriver,
            assembler,
            engine,
            metrics,
            timeout,
        }
    }

    /// Handle one raw request against `endpoint`.
    ///
    /// Every call is counted and timed. Only successful predictions reach the
    /// running median, and rejected requests never touch the model.
    pub async fn handle(&self, endpoint: &str, raw: Value) -> Result<PredictionResponse, RequestError> {
        self.metrics.increment_requests(endpoint);
        let start = Instant::now();

        let result = self.run(raw).await;

        let prediction = result.as_ref().ok().map(|r| r.prediction);
        self.metrics.record(endpoint, start.elapsed(), prediction);
        result
    }

    async fn run(&self, raw: Value) -> Result<PredictionResponse, RequestError> {
        let request = self.validator.validate(&raw)?;
        let user_id = request.user_id;
        tracing::info!(%user_id, "predicting");

        let prediction = self
            .predict(request.model_params)
            .await
            .inspect_err(|e| tracing::error!(%user_id, error = %e, "error while handling request"))?;

        tracing::info!(%user_id, prediction, "prediction ready");
        Ok(PredictionResponse { user_id, prediction })
    }

    /// Derive, assemble and predict on the blocking pool, bounded by the
    /// configured timeout.
    pub async fn predict(&self, params: ListingParams) -> Result<f64, InferenceError> {
        let deriver = self.deriver;
        let assembler = Arc::clone(&self.assembler);
        let engine = Arc::clone(&self.engine);

        self.bounded(move || {
            let derived = deriver.derive(&params);
            let vector = assembler.assemble(&derived)?;
            engine.predict(&vector)
        })
        .await
    }

    // A timed-out task still runs to completion; its result is discarded.
    async fn bounded<T, F>(&self, work: F) -> Result<T, InferenceError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, InferenceError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        }
    }
}
