//! Feature assembly: scaled numeric block, raw categorical block, and the
//! selected columns handed to the model.
//!
//! The column contract lives in a single [`FeatureSchema`]. Selection is by
//! column name and is resolved to positions once, when the schema is built;
//! the assembler additionally checks the scaler against the schema so a
//! mismatched artifact fails at startup rather than at inference time.

use std::collections::HashSet;

use crate::derive::{Column, DerivedFeatures};
use crate::errors::{InferenceError, ModelLoadError};
use crate::preprocess::StandardScaler;

pub const NUMERIC_FEATURES: [Column; 11] = [
    Column::Floor,
    Column::KitchenArea,
    Column::LivingArea,
    Column::TotalArea,
    Column::Rooms,
    Column::BuildYear,
    Column::CeilingHeight,
    Column::FlatsCount,
    Column::FloorsTotal,
    Column::AreaRatio,
    Column::RoomDensity,
];

pub const CATEGORICAL_FEATURES: [Column; 5] = [
    Column::IsApartment,
    Column::Studio,
    Column::BuildingId,
    Column::BuildingTypeInt,
    Column::HasElevator,
];

pub const SELECTED_FEATURES: [Column; 4] = [
    Column::RoomDensity,
    Column::IsApartment,
    Column::BuildingId,
    Column::BuildingTypeInt,
];

#[derive(Debug, Clone)]
pub struct FeatureSchema {
    numeric: Vec<Column>,
    categorical: Vec<Column>,
    selected: Vec<Column>,
    // positions of `selected` within numeric ++ categorical
    positions: Vec<usize>,
}

impl FeatureSchema {
    pub fn new(
        numeric: Vec<Column>,
        categorical: Vec<Column>,
        selected: Vec<Column>,
    ) -> Result<Self, ModelLoadError> {
        let concatenated: Vec<Column> = numeric.iter().chain(&categorical).copied().collect();

        let mut seen = HashSet::new();
        if let Some(dup) = concatenated.iter().find(|c| !seen.insert(**c)) {
            return Err(ModelLoadError::SchemaMismatch(format!(
                "column `{dup}` declared twice"
            )));
        }
        if selected.is_empty() {
            return Err(ModelLoadError::SchemaMismatch("no columns selected".into()));
        }

        let mut picked = HashSet::new();
        let mut positions = Vec::with_capacity(selected.len());
        for c in &selected {
            if !picked.insert(*c) {
                return Err(ModelLoadError::SchemaMismatch(format!(
                    "column `{c}` selected twice"
                )));
            }
            let pos = concatenated.iter().position(|x| x == c).ok_or_else(|| {
                ModelLoadError::SchemaMismatch(format!(
                    "selected column `{c}` is neither numeric nor categorical"
                ))
            })?;
            positions.push(pos);
        }

        Ok(Self {
            numeric,
            categorical,
            selected,
            positions,
        })
    }

    /// The contract the bundled model artifacts were trained against.
    pub fn standard() -> Result<Self, ModelLoadError> {
        Self::new(
            NUMERIC_FEATURES.to_vec(),
            CATEGORICAL_FEATURES.to_vec(),
            SELECTED_FEATURES.to_vec(),
        )
    }

    pub fn numeric(&self) -> &[Column] {
        &self.numeric
    }

    pub fn selected(&self) -> &[Column] {
        &self.selected
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Length of every vector the model receives.
    pub fn width(&self) -> usize {
        self.selected.len()
    }
}

/// Ordered model input. Only the assembler builds these, so the length
/// always matches the schema selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    #[cfg(test)]
    pub(crate) fn from_values(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    schema: FeatureSchema,
    scaler: StandardScaler,
}

impl FeatureAssembler {
    pub fn new(schema: FeatureSchema, scaler: StandardScaler) -> Result<Self, ModelLoadError> {
        let expected: Vec<&str> = schema.numeric().iter().map(|c| c.name()).collect();
        let fitted: Vec<&str> = scaler.feature_names().collect();
        if expected != fitted {
            return Err(ModelLoadError::SchemaMismatch(format!(
                "preprocessing pipeline was fitted on {fitted:?}, schema declares {expected:?}"
            )));
        }
        Ok(Self { schema, scaler })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn assemble(&self, derived: &DerivedFeatures) -> Result<FeatureVector, InferenceError> {
        let numeric: Vec<f64> = self.schema.numeric.iter().map(|c| derived.value(*c)).collect();
        let mut row = self.scaler.transform(&numeric)?;
        row.extend(self.schema.categorical.iter().map(|c| derived.value(*c)));

        let mut values = Vec::with_capacity(self.schema.width());
        for (&pos, column) in self.schema.positions.iter().zip(&self.schema.selected) {
            let v = row[pos];
            if !v.is_finite() {
                return Err(InferenceError::NonFinite {
                    column: column.name().to_string(),
                });
            }
            values.push(v);
        }

        tracing::debug!(
            in_dim = values.len(),
            sample = ?self.schema.selected.iter().zip(&values).map(|(c, v)| format!("{c}={v:.3}")).collect::<Vec<_>>(),
            "assembled feature vector"
        );
        Ok(FeatureVector(values))
    }

    /// All-zero vector of the right width, for warming up the model.
    pub fn neutral_vector(&self) -> FeatureVector {
        FeatureVector(vec![0.0; self.schema.width()])
    }
}
