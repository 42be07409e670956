//! Shared fitted-artifact fixtures for unit tests

use super::features::FeatureVector;
use super::model::{RegressionTree, RegressorParams};
use super::preprocess::{CategoricalBlock, HandleUnknown, NumericBlock, Preprocessor};
use super::persistence::CURRENT_VERSION;

/// Preprocessor with two known festival categories and all four seasons.
///
/// Output width is 5 numeric + 2 + 4 one-hot = 11.
pub fn preprocessor() -> Preprocessor {
    Preprocessor {
        version: CURRENT_VERSION,
        numeric: NumericBlock {
            columns: FeatureVector::NUMERIC_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            impute_statistics: vec![300.0, 150.0, 0.0, 0.0, 50.0],
            scaler_mean: vec![300.0, 150.0, 0.0, 0.0, 50.0],
            scaler_scale: vec![100.0, 50.0, 0.0, 1.0, 10.0],
        },
        categorical: CategoricalBlock {
            columns: FeatureVector::CATEGORICAL_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            categories: vec![
                vec!["관광".to_string(), "문화예술".to_string()],
                vec![
                    "가을".to_string(),
                    "겨울".to_string(),
                    "봄".to_string(),
                    "여름".to_string(),
                ],
            ],
            handle_unknown: HandleUnknown::Ignore,
        },
    }
}

/// Linear model with every coefficient set to `coefficient`.
pub fn linear_params(n_features: usize, coefficient: f64, intercept: f64) -> RegressorParams {
    RegressorParams::Linear {
        coefficients: vec![coefficient; n_features],
        intercept,
    }
}

/// Depth-one tree splitting on `feature` at `threshold`.
pub fn stump(feature: i64, threshold: f64, left: f64, right: f64) -> RegressionTree {
    RegressionTree {
        children_left: vec![1, -1, -1],
        children_right: vec![2, -1, -1],
        feature: vec![feature, -2, -2],
        threshold: vec![threshold, -2.0, -2.0],
        value: vec![0.0, left, right],
    }
}
