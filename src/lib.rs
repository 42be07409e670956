//! Festival Forecast Library
//!
//! This module exposes the core components of the festival visitor
//! prediction service for testing and reuse.

pub mod api;
pub mod config;
pub mod ml;
pub mod reference;
pub mod request;
pub mod traits;

// Re-export commonly used types
pub use api::{AppState, ErrorResponse, PredictResponse, create_router};
pub use config::AppConfig;
pub use ml::{
    ArtifactError, FeatureExtractor, FeatureVector, FestivalCategory, ModelError, PredictError,
    Prediction, Season, VisitorPredictor,
};
pub use reference::ReferenceDataset;
pub use request::{FestivalType, PredictionRequest, ValidationError};
pub use traits::{MockProjector, MockTransformChain, PlaceProjector, TransformChain};
