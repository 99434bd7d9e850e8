use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicantRecord, PredictionResult};
use super::risk::RiskLevel;

/// Audit row written for every single or eligibility prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    #[serde(flatten)]
    pub applicant: ApplicantRecord,
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub created_at: DateTime<Utc>,
}

impl DecisionRow {
    pub fn new(applicant: ApplicantRecord, result: &PredictionResult, created_at: DateTime<Utc>) -> Self {
        Self {
            applicant,
            prediction: result.prediction,
            probability: result.probability,
            risk_level: result.risk_level,
            created_at,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.prediction == 1
    }
}

/// A persisted [`DecisionRow`] with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDecision {
    pub id: u64,
    #[serde(flatten)]
    pub row: DecisionRow,
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait DecisionStore: Send + Sync {
    fn append(&self, row: DecisionRow) -> Result<StoredDecision, StoreError>;
    /// Decisions created at or after `cutoff`.
    fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredDecision>, StoreError>;
    /// Every decision, newest first.
    fn all(&self) -> Result<Vec<StoredDecision>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("decision store unavailable: {0}")]
    Unavailable(String),
    #[error("decision store corrupt at entry {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

/// Outbound channel for drift alerts (log sink, webhook, ...).
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, alert: DriftAlert) -> Result<(), AlertError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAlert {
    pub accuracy_7d: f64,
    pub accuracy_baseline: f64,
    pub sample_size: usize,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert transport unavailable: {0}")]
    Transport(String),
}
