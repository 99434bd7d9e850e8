//! Applicant scoring, explanation, audit, and monitoring for loan decisions.
//!
//! Data flows one way: a validated [`ApplicantRecord`] is encoded, scaled, and scored by the
//! shared [`ModelContext`], then tiered and explained by the [`PredictionPipeline`]. The
//! [`LoanDecisionService`] owns the collaborators (audit store, drift monitor) and is what
//! the HTTP router talks to.

pub mod analytics;
pub mod batch;
pub mod domain;
pub mod model;
pub mod monitoring;
pub mod pipeline;
pub mod repository;
pub mod risk;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use batch::{process_csv, BatchError, BatchSummary};
pub use domain::{
    ApplicantRecord, ApplicantSubmission, Explanation, Feature, FeatureAttribution, FieldValue,
    PredictionResult, ValidationError, FEATURE_COUNT,
};
pub use model::{ArtifactError, ModelContext};
pub use monitoring::{DriftMonitor, DriftReport, OutcomeSample};
pub use pipeline::{estimated_emi, PredictionMode, PredictionPipeline};
pub use repository::{
    AlertError, AlertNotifier, DecisionRow, DecisionStore, DriftAlert, StoreError,
    StoredDecision,
};
pub use risk::{classify_risk, RiskLevel};
pub use router::decision_router;
pub use service::{AuditStatus, DecisionOutcome, LoanDecisionService, ServiceError};
