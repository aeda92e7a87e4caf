use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Why an inbound request failed the schema check.
///
/// Diagnostic only: clients always see the same generic parameter message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("request is missing top-level field `{0}`")]
    MissingField(&'static str),

    #[error("`user_id` must be a string")]
    UserIdNotString,

    #[error("`model_params` must be a mapping")]
    ModelParamsNotMapping,

    #[error("missing required parameters: {}", .0.join(", "))]
    MissingModelParams(Vec<String>),

    #[error("invalid model parameter: {0}")]
    InvalidModelParam(String),
}

/// Artifact problems detected while starting up. Always fatal.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to read {what} at {path}")]
    Io {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what} at {path}")]
    Parse {
        what: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported model structure: {0}")]
    Unsupported(String),

    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("warmup prediction failed")]
    Warmup(#[source] InferenceError),
}

/// Failures after validation succeeded: derivation, assembly or prediction.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("transform expected {expected} numeric columns, got {got}")]
    TransformWidth { expected: usize, got: usize },

    #[error("feature vector has {got} values, model expects {expected}")]
    VectorWidth { expected: usize, got: usize },

    #[error("non-finite value in column `{column}`")]
    NonFinite { column: String },

    #[error("model produced a non-finite prediction")]
    NonFinitePrediction,

    #[error("prediction exceeded {0:?}")]
    Timeout(Duration),

    #[error("inference worker failed")]
    Worker(#[from] tokio::task::JoinError),
}

/// Client-facing outcome of a failed request.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Parameters(#[from] ValidationError),

    #[error(transparent)]
    Request(#[from] InferenceError),
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Parameters(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe message, without leaking internal details
    pub fn client_message(&self) -> &'static str {
        match self {
            RequestError::Parameters(_) => "Problem with parameters",
            RequestError::Request(_) => "Problem with request",
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.client_message() }))).into_response()
    }
}
