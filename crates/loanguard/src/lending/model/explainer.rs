use serde::Deserialize;

use crate::lending::domain::{Explanation, Feature, FeatureAttribution, FEATURE_COUNT};

use super::scaler::ScaledFeatureVector;

/// Attributions kept per explanation.
pub const TOP_FEATURES: usize = 5;
/// Leading attributions considered for improvement tips.
pub const TIP_CANDIDATES: usize = 3;

/// `explainer.json` as written by the training job.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainerArtifact {
    pub baseline: Vec<f64>,
}

/// Linear attribution against a background mean in scaled space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearExplainer {
    baseline: [f64; FEATURE_COUNT],
}

impl LinearExplainer {
    pub fn new(baseline: [f64; FEATURE_COUNT]) -> Self {
        Self { baseline }
    }

    pub fn explain(
        &self,
        coefficients: &[f64; FEATURE_COUNT],
        scaled: &ScaledFeatureVector,
    ) -> Explanation {
        let mut attributions: Vec<FeatureAttribution> = Feature::ALL
            .into_iter()
            .map(|feature| {
                let index = feature.index();
                FeatureAttribution {
                    feature,
                    attribution: coefficients[index] * (scaled.0[index] - self.baseline[index]),
                }
            })
            .collect();

        // stable sort keeps column order among equal magnitudes
        attributions.sort_by(|a, b| b.attribution.abs().total_cmp(&a.attribution.abs()));
        attributions.truncate(TOP_FEATURES);
        Explanation::from_ranked(attributions)
    }
}

/// Advice for the leading features that pulled the decision toward rejection.
pub fn improvement_tips(explanation: &Explanation) -> Vec<String> {
    explanation
        .ranked()
        .iter()
        .take(TIP_CANDIDATES)
        .filter(|entry| entry.attribution < 0.0)
        .filter_map(|entry| tip_for(entry.feature))
        .map(str::to_string)
        .collect()
}

pub fn tip_for(feature: Feature) -> Option<&'static str> {
    match feature {
        Feature::CreditHistory => Some(
            "Build a clean credit history by repaying existing obligations on time before reapplying.",
        ),
        Feature::ApplicantIncome => Some(
            "A higher documented applicant income would strengthen the application.",
        ),
        Feature::CoapplicantIncome => Some(
            "Adding a co-applicant with a steady income can improve eligibility.",
        ),
        Feature::LoanAmount => Some(
            "Consider requesting a smaller loan amount relative to your income.",
        ),
        Feature::LoanAmountTerm => Some(
            "A different repayment term may bring the monthly installment within reach.",
        ),
        Feature::SelfEmployed => Some(
            "Provide audited income statements to document self-employment earnings.",
        ),
        Feature::Gender
        | Feature::Married
        | Feature::Dependents
        | Feature::Education
        | Feature::PropertyArea => None,
    }
}
