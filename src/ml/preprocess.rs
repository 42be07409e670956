//! Fitted column preprocessor: mean imputation and standard scaling for the
//! numeric columns, one-hot encoding for the categorical ones.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use super::model::ModelError;
use super::persistence::{ArtifactError, Versioned, default_version, load_json};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericBlock {
    pub columns: Vec<String>,
    /// Fill values for missing inputs (training-set means)
    pub impute_statistics: Vec<f64>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    #[default]
    Ignore,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalBlock {
    pub columns: Vec<String>,
    /// Known categories per column, in encoder order
    pub categories: Vec<Vec<String>>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

/// Exported preprocessor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    #[serde(default = "default_version")]
    pub version: u32,
    pub numeric: NumericBlock,
    pub categorical: CategoricalBlock,
}

impl Versioned for Preprocessor {
    const KIND: &'static str = "preprocessor";

    fn version(&self) -> u32 {
        self.version
    }
}

impl Preprocessor {
    /// Load and validate against the feature vector column contract.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let preprocessor: Self = load_json(path)?;
        preprocessor.validate()?;
        Ok(preprocessor)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        let kind = Self::KIND;

        if self.numeric.columns != FeatureVector::NUMERIC_COLUMNS {
            return Err(ArtifactError::invalid(
                kind,
                format!(
                    "numeric columns {:?} do not match {:?}",
                    self.numeric.columns,
                    FeatureVector::NUMERIC_COLUMNS
                ),
            ));
        }
        if self.categorical.columns != FeatureVector::CATEGORICAL_COLUMNS {
            return Err(ArtifactError::invalid(
                kind,
                format!(
                    "categorical columns {:?} do not match {:?}",
                    self.categorical.columns,
                    FeatureVector::CATEGORICAL_COLUMNS
                ),
            ));
        }

        let n = self.numeric.columns.len();
        for (name, len) in [
            ("impute_statistics", self.numeric.impute_statistics.len()),
            ("scaler_mean", self.numeric.scaler_mean.len()),
            ("scaler_scale", self.numeric.scaler_scale.len()),
        ] {
            if len != n {
                return Err(ArtifactError::invalid(
                    kind,
                    format!("{} has {} values, expected {}", name, len, n),
                ));
            }
        }

        if self.categorical.categories.len() != self.categorical.columns.len() {
            return Err(ArtifactError::invalid(
                kind,
                format!(
                    "{} category lists for {} categorical columns",
                    self.categorical.categories.len(),
                    self.categorical.columns.len()
                ),
            ));
        }

        Ok(())
    }

    /// Width of the transformed row.
    pub fn output_width(&self) -> usize {
        self.numeric.columns.len()
            + self
                .categorical
                .categories
                .iter()
                .map(Vec::len)
                .sum::<usize>()
    }

    /// Transform one feature vector into the model's numeric row.
    pub fn transform(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        let mut row = Vec::with_capacity(self.output_width());

        let numeric = &self.numeric;
        for (i, value) in features.numeric_values().into_iter().enumerate() {
            let filled = value
                .filter(|v| !v.is_nan())
                .unwrap_or(numeric.impute_statistics[i]);
            // A constant training column has scale 0; it is left unscaled.
            let scale = match numeric.scaler_scale[i] {
                s if s == 0.0 => 1.0,
                s => s,
            };
            row.push((filled - numeric.scaler_mean[i]) / scale);
        }

        let categorical = &self.categorical;
        for (i, value) in features.categorical_values().into_iter().enumerate() {
            let known = &categorical.categories[i];
            let position = known.iter().position(|c| c == value);

            if position.is_none() && categorical.handle_unknown == HandleUnknown::Error {
                return Err(ModelError::UnknownCategory {
                    column: categorical.columns[i].clone(),
                    value: value.to_string(),
                });
            }

            row.extend((0..known.len()).map(|j| if Some(j) == position { 1.0 } else { 0.0 }));
        }

        Ok(row)
    }
}
