use serde::Deserialize;
use std::{fs, path::Path};

use crate::errors::{InferenceError, ModelLoadError};

/// Scales below this leave the centred value as is.
const MIN_SCALE: f64 = 1e-10;

#[derive(Debug, Clone, Deserialize)]
pub struct ScaledFeature {
    pub name: String,
    pub mean: f64,
    pub scale: f64,
}

#[derive(Deserialize)]
struct PipelineJson {
    features: Vec<ScaledFeature>,
}

/// Pre-fitted standard scaler for the numeric block: `(x - mean) / scale`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    features: Vec<ScaledFeature>,
}

impl StandardScaler {
    pub fn new(features: Vec<ScaledFeature>) -> Result<Self, ModelLoadError> {
        if features.is_empty() {
            return Err(ModelLoadError::Unsupported(
                "preprocessing pipeline has no features".into(),
            ));
        }
        if let Some(f) = features
            .iter()
            .find(|f| !f.mean.is_finite() || !f.scale.is_finite())
        {
            return Err(ModelLoadError::Unsupported(format!(
                "non-finite parameters for `{}`",
                f.name
            )));
        }
        Ok(Self { features })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            what: "preprocessing pipeline",
            path: path.display().to_string(),
            source,
        })?;
        let parsed: PipelineJson =
            serde_json::from_str(&txt).map_err(|source| ModelLoadError::Parse {
                what: "preprocessing pipeline",
                path: path.display().to_string(),
                source,
            })?;
        Self::new(parsed.features)
    }

    /// Column names the scaler was fitted on, in fit order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    pub fn width(&self) -> usize {
        self.features.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if row.len() != self.features.len() {
            return Err(InferenceError::TransformWidth {
                expected: self.features.len(),
                got: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(&self.features)
            .map(|(x, f)| {
                let centred = x - f.mean;
                if f.scale.abs() > MIN_SCALE {
                    centred / f.scale
                } else {
                    centred
                }
            })
            .collect())
    }
}
