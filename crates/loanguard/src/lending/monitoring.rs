//! Proxy-label drift assessment over the recent audit trail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::round_to;
use super::repository::{AlertNotifier, DecisionRow, DriftAlert};

pub const DRIFT_WINDOW_DAYS: i64 = 7;
pub const DRIFT_TOLERANCE: f64 = 0.10;
pub const DEFAULT_BASELINE_ACCURACY: f64 = 0.82;
/// Applicants above this income with a clean credit history are expected approvals.
pub const PROXY_INCOME_THRESHOLD: u32 = 3000;

/// The fields of a past decision the proxy label needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeSample {
    pub prediction: u8,
    pub applicant_income: u32,
    pub credit_history: u8,
}

impl OutcomeSample {
    pub fn expected_label(&self) -> u8 {
        u8::from(self.applicant_income > PROXY_INCOME_THRESHOLD && self.credit_history == 1)
    }

    pub fn matches_proxy(&self) -> bool {
        self.prediction == self.expected_label()
    }
}

impl From<&DecisionRow> for OutcomeSample {
    fn from(row: &DecisionRow) -> Self {
        Self {
            prediction: row.prediction,
            applicant_income: row.applicant.applicant_income,
            credit_history: row.applicant.credit_history,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub drift_detected: bool,
    pub accuracy_7d: Option<f64>,
    pub accuracy_baseline: f64,
    pub sample_size: usize,
    pub message: String,
}

pub struct DriftMonitor<N> {
    baseline: f64,
    notifier: Arc<N>,
    alert_sent: AtomicBool,
}

impl<N> DriftMonitor<N>
where
    N: AlertNotifier,
{
    pub fn new(baseline: f64, notifier: Arc<N>) -> Self {
        Self {
            baseline,
            notifier,
            alert_sent: AtomicBool::new(false),
        }
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(DRIFT_WINDOW_DAYS)
    }

    pub fn alert_sent(&self) -> bool {
        self.alert_sent.load(Ordering::Acquire)
    }

    /// Compare recent predictions against the proxy label.
    ///
    /// The first detected drift in the process lifetime notifies once; later
    /// detections only report.
    pub fn assess(&self, samples: &[OutcomeSample], now: DateTime<Utc>) -> DriftReport {
        let sample_size = samples.len();
        if sample_size == 0 {
            return DriftReport {
                drift_detected: false,
                accuracy_7d: None,
                accuracy_baseline: self.baseline,
                sample_size,
                message: "No predictions in the last 7 days".to_string(),
            };
        }

        let matches = samples.iter().filter(|sample| sample.matches_proxy()).count();
        let accuracy = round_to(matches as f64 / sample_size as f64, 4);
        let drift_detected = accuracy < self.baseline - DRIFT_TOLERANCE;

        if drift_detected {
            self.raise_once(accuracy, sample_size, now);
        }

        let message = if drift_detected {
            format!(
                "Model drift detected: 7-day accuracy {:.1}% is below the {:.1}% baseline",
                accuracy * 100.0,
                self.baseline * 100.0
            )
        } else {
            "Model performance is stable".to_string()
        };

        DriftReport {
            drift_detected,
            accuracy_7d: Some(accuracy),
            accuracy_baseline: self.baseline,
            sample_size,
            message,
        }
    }

    fn raise_once(&self, accuracy: f64, sample_size: usize, now: DateTime<Utc>) {
        if self
            .alert_sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let alert = DriftAlert {
            accuracy_7d: accuracy,
            accuracy_baseline: self.baseline,
            sample_size,
            detected_at: now,
        };
        match self.notifier.notify(alert) {
            Ok(()) => info!(accuracy, baseline = self.baseline, "drift alert dispatched"),
            Err(err) => warn!(error = %err, "drift alert delivery failed"),
        }
    }
}
