use serde::Deserialize;
use std::{fs, path::Path};

use crate::errors::{InferenceError, ModelLoadError};
use crate::features::{FeatureSchema, FeatureVector};

// CatBoost JSON export, restricted to the parts needed for float-feature
// oblivious trees.
#[derive(Deserialize)]
struct ModelJson {
    #[serde(default)]
    features_info: FeaturesInfoJson,
    oblivious_trees: Vec<TreeJson>,
    #[serde(default = "identity_scale_and_bias")]
    scale_and_bias: (f64, Vec<f64>),
}

#[derive(Deserialize, Default)]
struct FeaturesInfoJson {
    #[serde(default)]
    float_features: Vec<FloatFeatureJson>,
    #[serde(default)]
    categorical_features: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct FloatFeatureJson {
    feature_index: usize,
    #[serde(default)]
    feature_id: Option<String>,
}

#[derive(Deserialize)]
struct TreeJson {
    leaf_values: Vec<f64>,
    #[serde(default)]
    splits: Vec<SplitJson>,
}

#[derive(Deserialize)]
struct SplitJson {
    split_type: String,
    float_feature_index: Option<usize>,
    border: Option<f64>,
}

fn identity_scale_and_bias() -> (f64, Vec<f64>) {
    (1.0, vec![0.0])
}

/// One symmetric tree: every level tests the same split, so the leaf index
/// is the bitmask of split outcomes (level `i` sets bit `i`).
#[derive(Debug, Clone)]
struct ObliviousTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn leaf(&self, x: &[f64]) -> f64 {
        let index = self
            .splits
            .iter()
            .enumerate()
            .fold(0usize, |acc, (depth, &(feature, border))| {
                acc | (usize::from(x[feature] > border) << depth)
            });
        self.leaf_values[index]
    }
}

/// Gradient-boosted regression model, immutable once loaded.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    trees: Vec<ObliviousTree>,
    scale: f64,
    bias: f64,
    in_dim: usize,
}

impl PredictionEngine {
    pub fn load(path: impl AsRef<Path>, schema: &FeatureSchema) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            what: "model",
            path: path.display().to_string(),
            source,
        })?;
        let parsed: ModelJson = serde_json::from_str(&txt).map_err(|source| ModelLoadError::Parse {
            what: "model",
            path: path.display().to_string(),
            source,
        })?;
        let engine = Self::from_json(parsed, schema)?;
        tracing::info!(
            path = %path.display(),
            trees = engine.trees.len(),
            in_dim = engine.in_dim,
            "loaded model"
        );
        Ok(engine)
    }

    fn from_json(model: ModelJson, schema: &FeatureSchema) -> Result<Self, ModelLoadError> {
        let info = model.features_info;
        if !info.categorical_features.is_empty() {
            return Err(ModelLoadError::Unsupported(
                "categorical features with CTR statistics".into(),
            ));
        }

        let in_dim = info.float_features.len();
        if in_dim != schema.width() {
            return Err(ModelLoadError::SchemaMismatch(format!(
                "model expects {in_dim} features, schema selects {}",
                schema.width()
            )));
        }
        for (i, (f, column)) in info.float_features.iter().zip(schema.selected()).enumerate() {
            if f.feature_index != i {
                return Err(ModelLoadError::Unsupported(format!(
                    "float feature {i} has feature_index {}",
                    f.feature_index
                )));
            }
            match f.feature_id.as_deref() {
                Some(id) if !id.is_empty() && id != column.name() => {
                    return Err(ModelLoadError::SchemaMismatch(format!(
                        "model feature {i} is `{id}`, schema selects `{column}`"
                    )));
                }
                _ => {}
            }
        }

        let (scale, bias) = model.scale_and_bias;
        let bias = match bias.as_slice() {
            [b] => *b,
            other => {
                return Err(ModelLoadError::Unsupported(format!(
                    "expected a single-output model, got {} biases",
                    other.len()
                )))
            }
        };
        if !scale.is_finite() || !bias.is_finite() {
            return Err(ModelLoadError::Unsupported("non-finite scale or bias".into()));
        }

        let trees = model
            .oblivious_trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| Self::tree_from_json(t, tree, in_dim))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            scale,
            bias,
            in_dim,
        })
    }

    fn tree_from_json(t: usize, tree: TreeJson, in_dim: usize) -> Result<ObliviousTree, ModelLoadError> {
        let depth = tree.splits.len();
        if depth >= usize::BITS as usize || tree.leaf_values.len() != 1usize << depth {
            return Err(ModelLoadError::Unsupported(format!(
                "tree {t} has depth {depth} but {} leaves",
                tree.leaf_values.len()
            )));
        }
        if tree.leaf_values.iter().any(|v| !v.is_finite()) {
            return Err(ModelLoadError::Unsupported(format!("tree {t} has non-finite leaves")));
        }

        let splits = tree
            .splits
            .into_iter()
            .map(|s| match (s.split_type.as_str(), s.float_feature_index, s.border) {
                ("FloatFeature", Some(f), Some(border)) if f < in_dim && border.is_finite() => {
                    Ok((f, border))
                }
                (kind, f, _) => Err(ModelLoadError::Unsupported(format!(
                    "tree {t}: unsupported split {kind} on feature {f:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ObliviousTree {
            splits,
            leaf_values: tree.leaf_values,
        })
    }

    /// Number of values each input vector must carry.
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn predict(&self, x: &FeatureVector) -> Result<f64, InferenceError> {
        let x = x.as_slice();
        if x.len() != self.in_dim {
            return Err(InferenceError::VectorWidth {
                expected: self.in_dim,
                got: x.len(),
            });
        }
        let raw: f64 = self.trees.iter().map(|t| t.leaf(x)).sum();
        let y = self.scale * raw + self.bias;
        if y.is_finite() {
            Ok(y)
        } else {
            Err(InferenceError::NonFinitePrediction)
        }
    }
}
