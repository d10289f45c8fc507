use crate::model::{FEATURE_NAMES, FeatureVector, GenericError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// Fraud probability in `[0, 1]`.
    Probability(f64),
    Unavailable,
}

/// Evaluation metrics of a trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model_name: String,
    pub model_type: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub is_active: bool,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
}

/// Black-box classifier consulted by the hybrid scorer.
#[async_trait]
pub trait ModelEstimator: Send + Sync {
    /// Metrics of the model currently loaded, if any.
    fn active_model(&self) -> Option<ModelMetrics>;

    async fn predict(&self, features: &FeatureVector) -> Result<Estimate, GenericError>;
}

/// Standard-scaled logistic regression exported as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub metrics: ModelMetrics,
}

pub struct LinearModelEstimator {
    artifact: LinearModelArtifact,
    /// Position in [`FeatureVector::values`] of each artifact feature.
    feature_index: Vec<usize>,
}

impl LinearModelEstimator {
    pub fn load(path: &Path) -> Result<Self, GenericError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read model artifact {}: {}", path.display(), e))?;
        let artifact: LinearModelArtifact = serde_json::from_str(&contents)?;
        let estimator = Self::from_artifact(artifact)?;
        info!(
            model = %estimator.artifact.metrics.model_name,
            path = %path.display(),
            active = estimator.artifact.metrics.is_active,
            "Loaded model artifact"
        );
        Ok(estimator)
    }

    pub fn from_artifact(artifact: LinearModelArtifact) -> Result<Self, GenericError> {
        let n = artifact.feature_names.len();
        if artifact.means.len() != n
            || artifact.stds.len() != n
            || artifact.coefficients.len() != n
        {
            return Err(format!(
                "model artifact has {} features but {} means, {} stds and {} coefficients",
                n,
                artifact.means.len(),
                artifact.stds.len(),
                artifact.coefficients.len()
            )
            .into());
        }

        let feature_index = artifact
            .feature_names
            .iter()
            .map(|name| {
                FEATURE_NAMES
                    .iter()
                    .position(|known| known == name)
                    .ok_or_else(|| format!("model artifact uses unknown feature {:?}", name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            artifact,
            feature_index,
        })
    }

    pub fn probability(&self, features: &FeatureVector) -> f64 {
        let artifact = &self.artifact;
        let logit = self
            .feature_index
            .iter()
            .enumerate()
            .fold(artifact.intercept, |acc, (i, &index)| {
                let std = artifact.stds[i];
                let scaled = if std > 0.0 {
                    (features.values[index] - artifact.means[i]) / std
                } else {
                    0.0
                };
                acc + artifact.coefficients[i] * scaled
            });
        1.0 / (1.0 + (-logit).exp())
    }
}

#[async_trait]
impl ModelEstimator for LinearModelEstimator {
    fn active_model(&self) -> Option<ModelMetrics> {
        Some(self.artifact.metrics.clone())
    }

    async fn predict(&self, features: &FeatureVector) -> Result<Estimate, GenericError> {
        Ok(Estimate::Probability(self.probability(features)))
    }
}
