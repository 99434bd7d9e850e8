use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use crate::lending::domain::{ApplicantRecord, ApplicantSubmission, FEATURE_COUNT};
use crate::lending::model::{
    FeatureEncoder, FeatureSchema, LinearExplainer, LogisticClassifier, ModelContext,
    StandardScaler,
};
use crate::lending::repository::{
    AlertError, AlertNotifier, DecisionRow, DecisionStore, DriftAlert, StoreError,
    StoredDecision,
};
use crate::lending::risk::RiskLevel;
use crate::lending::service::LoanDecisionService;

pub(super) const MEAN: [f64; FEATURE_COUNT] = [
    0.8, 0.65, 0.75, 0.2, 0.14, 5400.0, 1600.0, 146.0, 342.0, 0.84, 1.04,
];
pub(super) const SCALE: [f64; FEATURE_COUNT] = [
    0.4, 0.48, 1.0, 0.4, 0.35, 6100.0, 2900.0, 85.0, 65.0, 0.36, 0.79,
];
pub(super) const COEFFICIENTS: [f64; FEATURE_COUNT] = [
    0.05, 0.25, 0.05, -0.2, -0.02, 0.05, 0.1, -0.15, -0.05, 1.3, 0.1,
];
pub(super) const INTERCEPT: f64 = 0.9;

pub(super) fn label_tables() -> BTreeMap<String, Vec<String>> {
    let mut tables = BTreeMap::new();
    for (column, classes) in [
        ("Gender", vec!["Female", "Male"]),
        ("Married", vec!["No", "Yes"]),
        ("Dependents", vec!["0", "1", "2", "3+"]),
        ("Education", vec!["Graduate", "Not Graduate"]),
        ("Self_Employed", vec!["No", "Yes"]),
        ("Property_Area", vec!["Rural", "Semiurban", "Urban"]),
        ("Loan_Status", vec!["N", "Y"]),
    ] {
        tables.insert(
            column.to_string(),
            classes.into_iter().map(str::to_string).collect(),
        );
    }
    tables
}

pub(super) fn model_with_explainer(explainer: Option<LinearExplainer>) -> Arc<ModelContext> {
    let schema = FeatureSchema::from_label_tables(label_tables()).expect("fixture tables");
    Arc::new(ModelContext::from_parts(
        FeatureEncoder::new(schema),
        StandardScaler::new(MEAN, SCALE),
        LogisticClassifier::new(COEFFICIENTS, INTERCEPT),
        explainer,
    ))
}

pub(super) fn model() -> Arc<ModelContext> {
    model_with_explainer(Some(LinearExplainer::new([0.0; FEATURE_COUNT])))
}

/// Scores roughly 0.873: approved, low risk, nothing to improve.
pub(super) fn strong_payload() -> Value {
    json!({
        "Gender": "Male",
        "Married": "Yes",
        "Dependents": "0",
        "Education": "Graduate",
        "Self_Employed": "No",
        "ApplicantIncome": 6000,
        "CoapplicantIncome": 2000,
        "LoanAmount": 120000,
        "Loan_Amount_Term": 360,
        "Credit_History": 1,
        "Property_Area": "Urban"
    })
}

/// Scores roughly 0.058: rejected, high risk, led by the missing credit history.
pub(super) fn weak_payload() -> Value {
    json!({
        "Gender": "Male",
        "Married": "No",
        "Dependents": "0",
        "Education": "Graduate",
        "Self_Employed": "No",
        "ApplicantIncome": 2500,
        "CoapplicantIncome": 0,
        "LoanAmount": 250000,
        "Loan_Amount_Term": 360,
        "Credit_History": 0,
        "Property_Area": "Rural"
    })
}

pub(super) fn submission(payload: Value) -> ApplicantSubmission {
    serde_json::from_value(payload).expect("fixture payload parses")
}

pub(super) fn record(payload: Value) -> ApplicantRecord {
    submission(payload).validate().expect("fixture payload validates")
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn decision(
    id: u64,
    applicant_income: u32,
    credit_history: u8,
    prediction: u8,
    days_ago: i64,
) -> StoredDecision {
    let mut applicant = record(strong_payload());
    applicant.applicant_income = applicant_income;
    applicant.credit_history = credit_history;
    StoredDecision {
        id,
        row: DecisionRow {
            applicant,
            prediction,
            probability: if prediction == 1 { 0.8 } else { 0.2 },
            risk_level: if prediction == 1 {
                RiskLevel::Low
            } else {
                RiskLevel::High
            },
            created_at: fixed_now() - Duration::days(days_ago),
        },
    }
}

pub(super) fn build_service() -> (
    LoanDecisionService<MemoryStore, MemoryAlerts>,
    Arc<MemoryStore>,
    Arc<MemoryAlerts>,
) {
    let store = Arc::new(MemoryStore::default());
    let alerts = Arc::new(MemoryAlerts::default());
    let service = LoanDecisionService::new(model(), store.clone(), alerts.clone(), 0.82);
    (service, store, alerts)
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) rows: Arc<Mutex<Vec<StoredDecision>>>,
}

impl MemoryStore {
    pub(super) fn seed(&self, decisions: Vec<StoredDecision>) {
        self.rows
            .lock()
            .expect("store mutex poisoned")
            .extend(decisions);
    }

    pub(super) fn len(&self) -> usize {
        self.rows.lock().expect("store mutex poisoned").len()
    }
}

impl DecisionStore for MemoryStore {
    fn append(&self, row: DecisionRow) -> Result<StoredDecision, StoreError> {
        let mut guard = self.rows.lock().expect("store mutex poisoned");
        let stored = StoredDecision {
            id: guard.len() as u64 + 1,
            row,
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredDecision>, StoreError> {
        let guard = self.rows.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|decision| decision.row.created_at >= cutoff)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<StoredDecision>, StoreError> {
        let guard = self.rows.lock().expect("store mutex poisoned");
        Ok(guard.iter().rev().cloned().collect())
    }
}

pub(super) struct UnavailableStore;

impl DecisionStore for UnavailableStore {
    fn append(&self, _row: DecisionRow) -> Result<StoredDecision, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn since(&self, _cutoff: DateTime<Utc>) -> Result<Vec<StoredDecision>, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn all(&self) -> Result<Vec<StoredDecision>, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAlerts {
    events: Arc<Mutex<Vec<DriftAlert>>>,
}

impl MemoryAlerts {
    pub(super) fn events(&self) -> Vec<DriftAlert> {
        self.events.lock().expect("alert mutex poisoned").clone()
    }
}

impl AlertNotifier for MemoryAlerts {
    fn notify(&self, alert: DriftAlert) -> Result<(), AlertError> {
        self.events
            .lock()
            .expect("alert mutex poisoned")
            .push(alert);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct FailingAlerts {
    pub(super) attempts: Mutex<usize>,
}

impl AlertNotifier for FailingAlerts {
    fn notify(&self, _alert: DriftAlert) -> Result<(), AlertError> {
        *self.attempts.lock().expect("alert mutex poisoned") += 1;
        Err(AlertError::Transport("webhook unreachable".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
