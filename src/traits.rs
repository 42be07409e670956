//! Seams around the fitted transforms to enable testing.
//!
//! This module provides traits for:
//! - `PlaceProjector`: Reducing the place-category features (the PCA step)
//! - `TransformChain`: Preprocessing a feature vector and running the model

use std::sync::{Arc, Mutex};

use crate::ml::features::FeatureVector;
use crate::ml::model::ModelError;

// ==================== PlaceProjector Trait ====================

/// Trait for projecting place-category counts onto principal components.
pub trait PlaceProjector: Send + Sync {
    /// Number of input features the projector was fitted on.
    fn n_features_in(&self) -> usize;

    /// Project one row; the first output is the leading component.
    fn project(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Mock projector for testing that returns a fixed output and records inputs.
#[derive(Debug, Clone)]
pub struct MockProjector {
    n_features_in: usize,
    output: Vec<f64>,
    fail: bool,
    inputs: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl MockProjector {
    /// Create a projector that always returns `output`.
    pub fn new(n_features_in: usize, output: Vec<f64>) -> Self {
        Self {
            n_features_in,
            output,
            fail: false,
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a projector whose every call fails.
    pub fn failing(n_features_in: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(n_features_in, Vec::new())
        }
    }

    /// Get all inputs the projector has been called with.
    pub fn get_inputs(&self) -> Vec<Vec<f64>> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

impl PlaceProjector for MockProjector {
    fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    fn project(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.inputs.lock().unwrap().push(features.to_vec());

        if self.fail {
            return Err(ModelError::NonFinite(f64::NAN));
        }
        Ok(self.output.clone())
    }
}

// ==================== TransformChain Trait ====================

/// Trait for the fitted preprocess -> regress chain.
///
/// The chain predicts the log-scale target `log1p(visitors)`.
pub trait TransformChain: Send + Sync {
    /// Turn a feature vector into the model's numeric row.
    fn preprocess(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError>;

    /// Predict the log-scale target for one preprocessed row.
    fn predict(&self, row: &[f64]) -> Result<f64, ModelError>;
}

/// Mock chain for testing that returns a fixed log prediction.
#[derive(Debug, Clone)]
pub struct MockTransformChain {
    log_prediction: Result<f64, ModelError>,
    features: Arc<Mutex<Vec<FeatureVector>>>,
}

impl MockTransformChain {
    /// Create a chain that always predicts `log_prediction`.
    pub fn new(log_prediction: f64) -> Self {
        Self {
            log_prediction: Ok(log_prediction),
            features: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a chain whose prediction step fails with `error`.
    pub fn failing(error: ModelError) -> Self {
        Self {
            log_prediction: Err(error),
            features: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all feature vectors passed to `preprocess`.
    pub fn get_features(&self) -> Vec<FeatureVector> {
        self.features.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.features.lock().unwrap().len()
    }

    /// Check if any prediction was requested.
    pub fn was_called(&self) -> bool {
        !self.features.lock().unwrap().is_empty()
    }
}

impl TransformChain for MockTransformChain {
    fn preprocess(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        self.features.lock().unwrap().push(features.clone());
        Ok(features.numeric_values().iter().map(|v| v.unwrap_or(0.0)).collect())
    }

    fn predict(&self, _row: &[f64]) -> Result<f64, ModelError> {
        self.log_prediction.clone()
    }
}
