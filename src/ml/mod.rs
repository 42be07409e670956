//! Machine Learning module for visitor-count prediction
//!
//! This module turns a validated request into a visitor estimate using a
//! fitted preprocessor, a PCA transform over place features and a regression
//! model trained on `log1p(visitors)`. All fitted state is loaded once at
//! startup and shared read-only.

pub mod address;
pub mod features;
pub mod model;
pub mod pca;
pub mod persistence;
pub mod preprocess;

#[cfg(test)]
pub(crate) mod fixtures;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ArtifactsConfig;
use crate::reference::ReferenceDataset;
use crate::request::{PredictionRequest, ValidationError};
use crate::traits::{PlaceProjector, TransformChain};

pub use address::AddressFrequencyMaps;
pub use features::{FeatureExtractor, FeatureVector, FestivalCategory, Season};
pub use model::{FittedChain, ModelError, Regressor};
pub use pca::FittedPca;
pub use persistence::ArtifactError;
pub use preprocess::Preprocessor;

/// Errors returned by the prediction pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("model evaluation failed: {0}")]
    Model(#[from] ModelError),
}

/// A visitor prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Raw model output on the `log1p` scale
    pub log_value: f64,
    /// `max(0, expm1(log_value))`
    pub visitors: f64,
}

impl Prediction {
    /// Convert a log-scale model output, clamping negatives to zero.
    pub fn from_log(log_value: f64) -> Result<Self, ModelError> {
        let visitors = log_value.exp_m1().max(0.0);
        if !visitors.is_finite() {
            return Err(ModelError::NonFinite(visitors));
        }
        Ok(Self {
            log_value,
            visitors,
        })
    }

    /// Visitor count rounded half-to-even.
    pub fn rounded(&self) -> u64 {
        self.visitors.round_ties_even() as u64
    }
}

/// Immutable prediction context shared by all requests
#[derive(Clone)]
pub struct VisitorPredictor {
    extractor: FeatureExtractor,
    chain: Arc<dyn TransformChain>,
}

impl VisitorPredictor {
    pub fn new(extractor: FeatureExtractor, chain: Arc<dyn TransformChain>) -> Self {
        Self { extractor, chain }
    }

    /// Load every artifact named by the configuration.
    ///
    /// Any missing or malformed artifact is an error; nothing is defaulted.
    pub fn from_config(config: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        let chain = FittedChain::load(&config.preprocessor_path(), &config.model_path())?;
        info!(
            "Loaded model from {}: {}",
            config.model_path().display(),
            chain.regressor().info()
        );

        let pca = FittedPca::load(&config.pca_path())?;
        info!(
            "Loaded PCA transformer with {} components over {} features",
            pca.n_components(),
            pca.n_features_in()
        );

        let address_maps: AddressFrequencyMaps =
            persistence::load_json(&config.address_freq_maps_path())?;
        info!("Loaded address frequency maps ({} keys)", address_maps.key_count());

        let reference = ReferenceDataset::load(&config.dataset_path())?;
        info!(
            "Loaded reference dataset: {} rows, {} regions",
            reference.len(),
            reference.region_count()
        );

        let projector: Arc<dyn PlaceProjector> = Arc::new(pca);
        let extractor = FeatureExtractor::new(
            Arc::new(reference),
            Arc::new(address_maps),
            Some(projector),
        );

        Ok(Self::new(extractor, Arc::new(chain)))
    }

    /// Predict the visitor count for a validated request.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictError> {
        let features = self.extractor.extract(request);
        debug!("Derived features: {:?}", features);

        let row = self.chain.preprocess(&features)?;
        let log_value = self.chain.predict(&row)?;
        let prediction = Prediction::from_log(log_value)?;

        debug!(
            "Log prediction {:.4} -> {:.2} visitors",
            prediction.log_value, prediction.visitors
        );
        Ok(prediction)
    }

    /// Validate a raw JSON body and predict.
    pub fn predict_json(&self, body: &[u8]) -> Result<Prediction, PredictError> {
        let request = PredictionRequest::from_slice(body)?;
        self.predict(&request)
    }
}

impl fmt::Debug for VisitorPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitorPredictor")
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}
