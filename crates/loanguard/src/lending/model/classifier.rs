use serde::Deserialize;

use crate::lending::domain::FEATURE_COUNT;

use super::scaler::ScaledFeatureVector;

/// `classifier.json` as written by the training job.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierArtifact {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

/// Binary logistic regression over the scaled features. Class 1 is Approved.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticClassifier {
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
}

impl LogisticClassifier {
    pub fn new(coefficients: [f64; FEATURE_COUNT], intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn coefficients(&self) -> &[f64; FEATURE_COUNT] {
        &self.coefficients
    }

    /// Log-odds of approval.
    pub fn decision_function(&self, scaled: &ScaledFeatureVector) -> f64 {
        self.coefficients
            .iter()
            .zip(scaled.0.iter())
            .fold(self.intercept, |acc, (coef, value)| acc + coef * value)
    }

    /// Returns `(prediction, probability of approval)`.
    pub fn predict(&self, scaled: &ScaledFeatureVector) -> (u8, f64) {
        let z = self.decision_function(scaled);
        let prediction = u8::from(z > 0.0);
        (prediction, sigmoid(z))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
