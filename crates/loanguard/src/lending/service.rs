use std::io::{Read, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::analytics::{
    self, DailyTrend, DecisionStats, IncomeBracketStats, LoanBucketStats, PropertyAreaStats,
    RiskCount,
};
use super::batch::{process_csv, BatchError, BatchSummary};
use super::domain::{ApplicantSubmission, PredictionResult, ValidationError};
use super::model::ModelContext;
use super::monitoring::{DriftMonitor, DriftReport, OutcomeSample};
use super::pipeline::{PredictionMode, PredictionPipeline};
use super::repository::{AlertNotifier, DecisionRow, DecisionStore, StoreError, StoredDecision};

/// Whether the audit row for a decision was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditStatus {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditStatus {
    fn recorded(id: u64) -> Self {
        Self {
            recorded: true,
            decision_id: Some(id),
            error: None,
        }
    }

    fn failed(err: &StoreError) -> Self {
        Self {
            recorded: false,
            decision_id: None,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub audit: AuditStatus,
}

/// Service composing the prediction pipeline, the audit store, and the drift monitor.
pub struct LoanDecisionService<S, N> {
    pipeline: PredictionPipeline,
    store: Arc<S>,
    monitor: DriftMonitor<N>,
}

impl<S, N> LoanDecisionService<S, N>
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    pub fn new(model: Arc<ModelContext>, store: Arc<S>, notifier: Arc<N>, baseline: f64) -> Self {
        Self {
            pipeline: PredictionPipeline::new(model),
            store,
            monitor: DriftMonitor::new(baseline, notifier),
        }
    }

    pub fn pipeline(&self) -> &PredictionPipeline {
        &self.pipeline
    }

    pub fn monitor(&self) -> &DriftMonitor<N> {
        &self.monitor
    }

    /// Score one applicant and record the decision.
    pub fn predict(&self, submission: &ApplicantSubmission) -> Result<DecisionOutcome, ServiceError> {
        self.decide(submission, PredictionMode::Single)
    }

    /// Score one applicant with an installment estimate and record the decision.
    pub fn check_eligibility(
        &self,
        submission: &ApplicantSubmission,
    ) -> Result<DecisionOutcome, ServiceError> {
        self.decide(submission, PredictionMode::Eligibility)
    }

    fn decide(
        &self,
        submission: &ApplicantSubmission,
        mode: PredictionMode,
    ) -> Result<DecisionOutcome, ServiceError> {
        let applicant = submission.validate()?;
        let result = self.pipeline.run(&applicant, mode)?;

        let row = DecisionRow::new(applicant, &result, Utc::now());
        let audit = match self.store.append(row) {
            Ok(stored) => {
                info!(
                    decision_id = stored.id,
                    decision = result.decision_label(),
                    risk = %result.risk_level,
                    "decision recorded"
                );
                AuditStatus::recorded(stored.id)
            }
            Err(err) => {
                error!(error = %err, decision = result.decision_label(), "failed to record decision");
                AuditStatus::failed(&err)
            }
        };

        Ok(DecisionOutcome { result, audit })
    }

    /// Score a CSV file. Batch rows are not recorded.
    pub fn batch_predict<R: Read, W: Write>(
        &self,
        reader: R,
        writer: W,
    ) -> Result<BatchSummary, ServiceError> {
        Ok(process_csv(&self.pipeline, reader, writer)?)
    }

    pub fn drift_status(&self, now: DateTime<Utc>) -> Result<DriftReport, ServiceError> {
        let recent = self.store.since(self.monitor.window_start(now))?;
        let samples: Vec<OutcomeSample> = recent
            .iter()
            .map(|decision| OutcomeSample::from(&decision.row))
            .collect();
        Ok(self.monitor.assess(&samples, now))
    }

    pub fn applications(&self) -> Result<Vec<StoredDecision>, ServiceError> {
        Ok(self.store.all()?)
    }

    pub fn stats(&self) -> Result<DecisionStats, ServiceError> {
        Ok(analytics::summarize(&self.store.all()?))
    }

    pub fn trends(&self, now: DateTime<Utc>) -> Result<Vec<DailyTrend>, ServiceError> {
        let cutoff = now - chrono::Duration::days(analytics::TREND_WINDOW_DAYS);
        Ok(analytics::daily_trends(&self.store.since(cutoff)?, now))
    }

    pub fn income_brackets(&self) -> Result<Vec<IncomeBracketStats>, ServiceError> {
        Ok(analytics::income_brackets(&self.store.all()?))
    }

    pub fn risk_distribution(&self) -> Result<Vec<RiskCount>, ServiceError> {
        Ok(analytics::risk_distribution(&self.store.all()?))
    }

    pub fn loan_amount_distribution(&self) -> Result<Vec<LoanBucketStats>, ServiceError> {
        Ok(analytics::loan_amount_distribution(&self.store.all()?))
    }

    pub fn property_area_stats(&self) -> Result<Vec<PropertyAreaStats>, ServiceError> {
        Ok(analytics::property_area_stats(&self.store.all()?))
    }
}

/// Error raised by the decision service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}
