//! Fitted regression model and the preprocess -> predict chain

use std::path::Path;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::features::FeatureVector;
use super::persistence::{ArtifactError, Versioned, default_version, load_json};
use super::preprocess::Preprocessor;
use crate::traits::TransformChain;

/// Errors raised while evaluating a fitted transform
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{stage} input has {found} values, expected {expected}")]
    DimensionMismatch {
        stage: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("unknown category {value:?} for column {column:?}")]
    UnknownCategory { column: String, value: String },
    #[error("model produced a non-finite value: {0}")]
    NonFinite(f64),
}

/// One regression tree in scikit-learn's flat array layout.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise samples with
/// `x[feature[i]] <= threshold[i]` go to `children_left[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err("tree arrays differ in length".to_string());
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if left == -1 {
                continue;
            }
            // Children must point forward, which also rules out cycles.
            let in_range = |c: i64| c > i as i64 && (c as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {} has invalid children ({}, {})", i, left, right));
            }
            if self.feature[i] < 0 || self.feature[i] as usize >= n_features {
                return Err(format!("node {} splits on invalid feature {}", i, self.feature[i]));
            }
        }

        Ok(())
    }

    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            // Splits were fitted on float32 inputs.
            let x = f64::from(row[self.feature[node] as usize] as f32);
            node = if x <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Gradient boosting: trees are added
    Sum,
    /// Random forest: trees are averaged
    Mean,
}

/// Fitted regressor parameters, tagged by model family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorParams {
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    TreeEnsemble {
        init: f64,
        learning_rate: f64,
        aggregation: Aggregation,
        n_features: usize,
        trees: Vec<RegressionTree>,
    },
}

/// Exported regression model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressorArtifact {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(flatten)]
    pub params: RegressorParams,
}

impl Versioned for RegressorArtifact {
    const KIND: &'static str = "regression model";

    fn version(&self) -> u32 {
        self.version
    }
}

/// A validated regression model predicting `log1p(visitors)`
#[derive(Debug, Clone)]
pub enum Regressor {
    Linear {
        coefficients: Array1<f64>,
        intercept: f64,
    },
    TreeEnsemble {
        init: f64,
        learning_rate: f64,
        aggregation: Aggregation,
        n_features: usize,
        trees: Vec<RegressionTree>,
    },
}

impl Regressor {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let artifact: RegressorArtifact = load_json(path)?;
        Self::from_params(artifact.params)
    }

    pub fn from_params(params: RegressorParams) -> Result<Self, ArtifactError> {
        let kind = RegressorArtifact::KIND;

        match params {
            RegressorParams::Linear {
                coefficients,
                intercept,
            } => {
                if coefficients.is_empty() {
                    return Err(ArtifactError::invalid(kind, "linear model has no coefficients"));
                }
                Ok(Regressor::Linear {
                    coefficients: Array1::from_vec(coefficients),
                    intercept,
                })
            }
            RegressorParams::TreeEnsemble {
                init,
                learning_rate,
                aggregation,
                n_features,
                trees,
            } => {
                if trees.is_empty() {
                    return Err(ArtifactError::invalid(kind, "tree ensemble has no trees"));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(n_features)
                        .map_err(|e| ArtifactError::invalid(kind, format!("tree {}: {}", i, e)))?;
                }
                Ok(Regressor::TreeEnsemble {
                    init,
                    learning_rate,
                    aggregation,
                    n_features,
                    trees,
                })
            }
        }
    }

    /// Number of input columns the model was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            Regressor::Linear { coefficients, .. } => coefficients.len(),
            Regressor::TreeEnsemble { n_features, .. } => *n_features,
        }
    }

    /// Predict the log-scale target for one preprocessed row.
    pub fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        if row.len() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                stage: "model",
                expected: self.n_features(),
                found: row.len(),
            });
        }

        let row = ArrayView1::from(row);
        let prediction = match self {
            Regressor::Linear {
                coefficients,
                intercept,
            } => coefficients.dot(&row) + intercept,
            Regressor::TreeEnsemble {
                init,
                learning_rate,
                aggregation,
                trees,
                ..
            } => {
                let total: f64 = trees.iter().map(|t| t.predict(row)).sum();
                let combined = match aggregation {
                    Aggregation::Sum => total,
                    Aggregation::Mean => total / trees.len() as f64,
                };
                init + learning_rate * combined
            }
        };

        if !prediction.is_finite() {
            return Err(ModelError::NonFinite(prediction));
        }

        Ok(prediction)
    }

    /// Get model information as a string
    pub fn info(&self) -> String {
        match self {
            Regressor::Linear { coefficients, .. } => {
                format!("Linear(features={})", coefficients.len())
            }
            Regressor::TreeEnsemble {
                n_features,
                trees,
                aggregation,
                ..
            } => format!(
                "TreeEnsemble(features={}, trees={}, aggregation={:?})",
                n_features,
                trees.len(),
                aggregation
            ),
        }
    }
}

/// Preprocessor and regressor loaded from disk
#[derive(Debug, Clone)]
pub struct FittedChain {
    preprocessor: Preprocessor,
    regressor: Regressor,
}

impl FittedChain {
    /// Pair a preprocessor with a regressor, checking that widths agree.
    pub fn new(preprocessor: Preprocessor, regressor: Regressor) -> Result<Self, ArtifactError> {
        preprocessor.validate()?;
        if preprocessor.output_width() != regressor.n_features() {
            return Err(ArtifactError::invalid(
                RegressorArtifact::KIND,
                format!(
                    "model expects {} features but preprocessor produces {}",
                    regressor.n_features(),
                    preprocessor.output_width()
                ),
            ));
        }
        Ok(Self {
            preprocessor,
            regressor,
        })
    }

    pub fn load(preprocessor_path: &Path, model_path: &Path) -> Result<Self, ArtifactError> {
        let preprocessor = Preprocessor::load(preprocessor_path)?;
        let regressor = Regressor::load(model_path)?;
        Self::new(preprocessor, regressor)
    }

    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }
}

impl TransformChain for FittedChain {
    fn preprocess(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        self.preprocessor.transform(features)
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        self.regressor.predict(row)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::ml::features::{FestivalCategory, Season};
    use crate::ml::fixtures::{linear_params, preprocessor, stump};
    use crate::ml::persistence::save_json;

    fn features() -> FeatureVector {
        FeatureVector {
            budget: 400.0,
            distance_to_capital: Some(200.0),
            per_capita_budget: 0.0,
            place_pca: 0.0,
            address_score: 50.0,
            festival_category: FestivalCategory::Tourism,
            season: Season::Summer,
        }
    }

    // ==================== Linear ====================

    #[test]
    fn test_linear_predict() {
        let model = Regressor::from_params(RegressorParams::Linear {
            coefficients: vec![2.0, -1.0, 0.5],
            intercept: 1.0,
        })
        .unwrap();

        let prediction = model.predict(&[1.0, 2.0, 4.0]).unwrap();
        assert_relative_eq!(prediction, 3.0);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let model = Regressor::from_params(RegressorParams::Linear {
            coefficients: vec![1.0; 3],
            intercept: 0.0,
        })
        .unwrap();

        assert!(matches!(
            model.predict(&[1.0]),
            Err(ModelError::DimensionMismatch {
                stage: "model",
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn test_non_finite_prediction_is_error() {
        let model = Regressor::from_params(RegressorParams::Linear {
            coefficients: vec![f64::MAX, f64::MAX],
            intercept: 0.0,
        })
        .unwrap();

        assert!(matches!(
            model.predict(&[f64::MAX, f64::MAX]),
            Err(ModelError::NonFinite(_))
        ));
    }

    // ==================== Tree Ensemble ====================

    #[test]
    fn test_boosted_trees() {
        let model = Regressor::from_params(RegressorParams::TreeEnsemble {
            init: 5.0,
            learning_rate: 0.1,
            aggregation: Aggregation::Sum,
            n_features: 2,
            trees: vec![stump(0, 1.0, -2.0, 2.0), stump(1, 0.0, -1.0, 1.0)],
        })
        .unwrap();

        assert_relative_eq!(model.predict(&[0.5, 3.0]).unwrap(), 5.0 + 0.1 * (-2.0 + 1.0));
        assert_relative_eq!(model.predict(&[1.5, -3.0]).unwrap(), 5.0 + 0.1 * (2.0 - 1.0));
    }

    #[test]
    fn test_threshold_goes_left() {
        let model = Regressor::from_params(RegressorParams::TreeEnsemble {
            init: 0.0,
            learning_rate: 1.0,
            aggregation: Aggregation::Sum,
            n_features: 1,
            trees: vec![stump(0, 1.0, 10.0, 20.0)],
        })
        .unwrap();

        assert_eq!(model.predict(&[1.0]).unwrap(), 10.0);
    }

    #[test]
    fn test_split_compares_at_float32_precision() {
        let model = Regressor::from_params(RegressorParams::TreeEnsemble {
            init: 0.0,
            learning_rate: 1.0,
            aggregation: Aggregation::Sum,
            n_features: 1,
            trees: vec![stump(0, 0.1, 10.0, 20.0)],
        })
        .unwrap();

        // 0.1f32 widened to f64 is slightly above 0.1
        assert_eq!(model.predict(&[0.1]).unwrap(), 20.0);
        assert_eq!(model.predict(&[0.09]).unwrap(), 10.0);
    }

    #[test]
    fn test_forest_averages() {
        let model = Regressor::from_params(RegressorParams::TreeEnsemble {
            init: 0.0,
            learning_rate: 1.0,
            aggregation: Aggregation::Mean,
            n_features: 1,
            trees: vec![stump(0, 0.0, 2.0, 4.0), stump(0, 0.0, 6.0, 8.0)],
        })
        .unwrap();

        assert_relative_eq!(model.predict(&[1.0]).unwrap(), 6.0);
    }

    #[test]
    fn test_tree_with_backward_child_rejected() {
        let tree = RegressionTree {
            children_left: vec![1, 0, -1],
            children_right: vec![2, 2, -1],
            feature: vec![0, 0, -2],
            threshold: vec![0.0, 0.0, -2.0],
            value: vec![0.0, 0.0, 1.0],
        };
        let result = Regressor::from_params(RegressorParams::TreeEnsemble {
            init: 0.0,
            learning_rate: 1.0,
            aggregation: Aggregation::Sum,
            n_features: 1,
            trees: vec![tree],
        });

        assert!(matches!(result, Err(ArtifactError::Invalid { .. })));
    }

    #[test]
    fn test_tree_with_out_of_range_feature_rejected() {
        let result = Regressor::from_params(RegressorParams::TreeEnsemble {
            init: 0.0,
            learning_rate: 1.0,
            aggregation: Aggregation::Sum,
            n_features: 1,
            trees: vec![stump(3, 0.0, 1.0, 2.0)],
        });

        assert!(result.is_err());
    }

    // ==================== Artifact Format ====================

    #[test]
    fn test_artifact_json_is_tagged() {
        let json = r#"{"version": 1, "kind": "linear", "coefficients": [1.0, 2.0], "intercept": 0.5}"#;
        let artifact: RegressorArtifact = serde_json::from_str(json).unwrap();

        assert!(matches!(artifact.params, RegressorParams::Linear { .. }));
    }

    #[test]
    fn test_load_saved_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("best_model.json");
        let artifact = RegressorArtifact {
            version: 1,
            params: linear_params(11, 0.1, 6.0),
        };
        save_json(&artifact, &path).unwrap();

        let model = Regressor::load(&path).unwrap();
        assert_eq!(model.n_features(), 11);
        assert!(model.info().contains("Linear"));
    }

    // ==================== Chain ====================

    #[test]
    fn test_chain_width_mismatch_rejected() {
        let regressor = Regressor::from_params(linear_params(4, 0.0, 0.0)).unwrap();
        let result = FittedChain::new(preprocessor(), regressor);

        assert!(matches!(result, Err(ArtifactError::Invalid { .. })));
    }

    #[test]
    fn test_chain_preprocess_then_predict() {
        let regressor = Regressor::from_params(linear_params(11, 0.0, 7.5)).unwrap();
        let chain = FittedChain::new(preprocessor(), regressor).unwrap();

        let row = chain.preprocess(&features()).unwrap();
        assert_eq!(row.len(), 11);

        let prediction = chain.predict(&row).unwrap();
        assert_relative_eq!(prediction, 7.5);
    }
}
