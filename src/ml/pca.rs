//! Fitted PCA transform for the place-category features

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::model::ModelError;
use super::persistence::{ArtifactError, Versioned, default_version, load_json};
use crate::traits::PlaceProjector;

/// Exported PCA parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaArtifact {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Per-feature mean removed before projection
    pub mean: Vec<f64>,
    /// One row per component, each of length `mean.len()`
    pub components: Vec<Vec<f64>>,
    #[serde(default)]
    pub explained_variance: Option<Vec<f64>>,
    #[serde(default)]
    pub whiten: bool,
}

impl Versioned for PcaArtifact {
    const KIND: &'static str = "PCA transformer";

    fn version(&self) -> u32 {
        self.version
    }
}

/// PCA ready for projection
#[derive(Debug, Clone)]
pub struct FittedPca {
    mean: Array1<f64>,
    /// Shape (n_components, n_features)
    components: Array2<f64>,
    /// Per-component divisor, present only when whitening
    whiten_scale: Option<Array1<f64>>,
}

impl FittedPca {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let artifact: PcaArtifact = load_json(path)?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: PcaArtifact) -> Result<Self, ArtifactError> {
        let kind = PcaArtifact::KIND;
        let n_features = artifact.mean.len();
        let n_components = artifact.components.len();

        if n_features == 0 || n_components == 0 {
            return Err(ArtifactError::invalid(kind, "mean and components must be non-empty"));
        }

        if let Some((i, row)) = artifact
            .components
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != n_features)
        {
            return Err(ArtifactError::invalid(
                kind,
                format!("component {} has {} values, expected {}", i, row.len(), n_features),
            ));
        }

        let flat: Vec<f64> = artifact.components.into_iter().flatten().collect();
        let components = Array2::from_shape_vec((n_components, n_features), flat)
            .map_err(|e| ArtifactError::invalid(kind, e.to_string()))?;

        let whiten_scale = if artifact.whiten {
            let variance = artifact
                .explained_variance
                .ok_or_else(|| ArtifactError::invalid(kind, "whiten requires explained_variance"))?;
            if variance.len() != n_components {
                return Err(ArtifactError::invalid(
                    kind,
                    format!(
                        "explained_variance has {} values, expected {}",
                        variance.len(),
                        n_components
                    ),
                ));
            }
            Some(Array1::from_vec(variance).mapv(f64::sqrt))
        } else {
            None
        };

        Ok(Self {
            mean: Array1::from_vec(artifact.mean),
            components,
            whiten_scale,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }
}

impl PlaceProjector for FittedPca {
    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn project(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                stage: "pca",
                expected: self.mean.len(),
                found: features.len(),
            });
        }

        let centered = &ArrayView1::from(features) - &self.mean;
        let mut projected = self.components.dot(&centered);

        if let Some(scale) = &self.whiten_scale {
            projected /= scale;
        }

        Ok(projected.to_vec())
    }
}
