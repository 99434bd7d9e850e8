use serde::Deserialize;

use crate::lending::domain::{Feature, FEATURE_COUNT};

use super::encoder::EncodedFeatureVector;

/// `scaler.json` as written by the training job.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerArtifact {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

/// Standardized features, the input of both the classifier and the explainer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledFeatureVector(pub [f64; FEATURE_COUNT]);

impl ScaledFeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// A zero scale (constant training column) divides by one instead.
    pub fn new(mean: [f64; FEATURE_COUNT], scale: [f64; FEATURE_COUNT]) -> Self {
        let scale = scale.map(|value| if value == 0.0 { 1.0 } else { value });
        Self { mean, scale }
    }

    pub fn transform(&self, encoded: &EncodedFeatureVector) -> ScaledFeatureVector {
        let mut scaled = [0.0; FEATURE_COUNT];
        for (index, slot) in scaled.iter_mut().enumerate() {
            *slot = (encoded.0[index] - self.mean[index]) / self.scale[index];
        }
        ScaledFeatureVector(scaled)
    }
}
