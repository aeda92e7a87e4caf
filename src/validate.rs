//! Structural checks on an inbound request before anything else touches it.

use serde_json::Value;

use crate::errors::ValidationError;
use crate::types::{ListingParams, PredictionRequest, REQUIRED_MODEL_PARAMS};

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// Checks, in order: both top-level keys exist, `user_id` is a string,
    /// `model_params` is a mapping, and every required parameter is present.
    /// Only then are the parameters converted into their typed form.
    pub fn validate(&self, raw: &Value) -> Result<PredictionRequest, ValidationError> {
        let result = self.check(raw);
        match &result {
            Ok(req) => tracing::debug!(user_id = %req.user_id, "all request params present"),
            Err(e) => tracing::info!(error = %e, "rejecting request"),
        }
        result
    }

    fn check(&self, raw: &Value) -> Result<PredictionRequest, ValidationError> {
        let user_id = raw.get("user_id").ok_or(ValidationError::MissingField("user_id"))?;
        let model_params = raw
            .get("model_params")
            .ok_or(ValidationError::MissingField("model_params"))?;

        let user_id = user_id.as_str().ok_or(ValidationError::UserIdNotString)?;
        let params = model_params
            .as_object()
            .ok_or(ValidationError::ModelParamsNotMapping)?;

        let missing: Vec<String> = REQUIRED_MODEL_PARAMS
            .iter()
            .filter(|k| !params.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingModelParams(missing));
        }

        let model_params: ListingParams = serde_json::from_value(model_params.clone())
            .map_err(|e| ValidationError::InvalidModelParam(e.to_string()))?;

        Ok(PredictionRequest {
            user_id: user_id.to_string(),
            model_params,
        })
    }
}
