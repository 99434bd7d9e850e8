use std::sync::Arc;

use tracing::debug;

use super::domain::{ApplicantRecord, Explanation, PredictionResult, ValidationError};
use super::model::{improvement_tips, ModelContext};
use super::risk::classify_risk;

/// Nominal annual rate used for the eligibility installment estimate.
pub const ANNUAL_INTEREST_RATE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    Single,
    Batch,
    Eligibility,
}

/// Equated monthly installment for an amortizing loan.
///
/// Returns 0 when there is no repayment period to spread the principal over.
pub fn estimated_emi(principal: f64, annual_rate: f64, months: i64) -> f64 {
    if months <= 0 || principal <= 0.0 {
        return 0.0;
    }
    let n = months as f64;
    let r = annual_rate / 12.0;
    if r == 0.0 {
        return principal / n;
    }
    let growth = (1.0 + r).powf(n);
    principal * r * growth / (growth - 1.0)
}

/// Encoder, classifier, risk tiering, and explanation in a fixed order.
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    model: Arc<ModelContext>,
}

impl PredictionPipeline {
    pub fn new(model: Arc<ModelContext>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelContext {
        &self.model
    }

    pub fn run(
        &self,
        record: &ApplicantRecord,
        mode: PredictionMode,
    ) -> Result<PredictionResult, ValidationError> {
        let encoded = self.model.encoder.encode(record)?;
        let scaled = self.model.scaler.transform(&encoded);
        let (prediction, probability) = self.model.classifier.predict(&scaled);
        let risk_level = classify_risk(probability);

        let (explanation, improvement_tips) = match &self.model.explainer {
            Some(explainer) => {
                let explanation = explainer.explain(self.model.classifier.coefficients(), &scaled);
                let tips = improvement_tips(&explanation);
                (explanation, tips)
            }
            None => (Explanation::unavailable(), Vec::new()),
        };

        let estimated_emi = match mode {
            PredictionMode::Eligibility => Some(estimated_emi(
                f64::from(record.loan_amount),
                ANNUAL_INTEREST_RATE,
                i64::from(record.loan_amount_term),
            )),
            PredictionMode::Single | PredictionMode::Batch => None,
        };

        debug!(
            ?mode,
            prediction,
            probability,
            risk = %risk_level,
            "applicant scored"
        );

        Ok(PredictionResult {
            prediction,
            probability,
            risk_level,
            explanation,
            improvement_tips,
            estimated_emi,
        })
    }
}
