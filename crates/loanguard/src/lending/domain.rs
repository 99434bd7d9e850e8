use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::risk::RiskLevel;

/// Number of model input columns.
pub const FEATURE_COUNT: usize = 11;

/// Model input columns in the order the scaler and classifier were fit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    Gender,
    Married,
    Dependents,
    Education,
    #[serde(rename = "Self_Employed")]
    SelfEmployed,
    ApplicantIncome,
    CoapplicantIncome,
    LoanAmount,
    #[serde(rename = "Loan_Amount_Term")]
    LoanAmountTerm,
    #[serde(rename = "Credit_History")]
    CreditHistory,
    #[serde(rename = "Property_Area")]
    PropertyArea,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Gender,
        Feature::Married,
        Feature::Dependents,
        Feature::Education,
        Feature::SelfEmployed,
        Feature::ApplicantIncome,
        Feature::CoapplicantIncome,
        Feature::LoanAmount,
        Feature::LoanAmountTerm,
        Feature::CreditHistory,
        Feature::PropertyArea,
    ];

    /// Column header used by the training data, the JSON API, and batch CSV files.
    pub fn column(self) -> &'static str {
        match self {
            Feature::Gender => "Gender",
            Feature::Married => "Married",
            Feature::Dependents => "Dependents",
            Feature::Education => "Education",
            Feature::SelfEmployed => "Self_Employed",
            Feature::ApplicantIncome => "ApplicantIncome",
            Feature::CoapplicantIncome => "CoapplicantIncome",
            Feature::LoanAmount => "LoanAmount",
            Feature::LoanAmountTerm => "Loan_Amount_Term",
            Feature::CreditHistory => "Credit_History",
            Feature::PropertyArea => "Property_Area",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.column() == name.trim())
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Feature::Gender
                | Feature::Married
                | Feature::Dependents
                | Feature::Education
                | Feature::SelfEmployed
                | Feature::PropertyArea
        )
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Loosely typed field value as it arrives from JSON bodies or CSV cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    /// Booleans, arrays, and objects; rejected by `validate`.
    Unsupported(serde_json::Value),
}

impl FieldValue {
    fn unsupported_kind(value: &serde_json::Value) -> &'static str {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "a boolean",
            serde_json::Value::Array(_) => "an array",
            serde_json::Value::Object(_) => "an object",
            serde_json::Value::Number(_) => "a number",
            serde_json::Value::String(_) => "a string",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Inbound applicant payload before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantSubmission {
    #[serde(rename = "Gender")]
    pub gender: Option<FieldValue>,
    #[serde(rename = "Married")]
    pub married: Option<FieldValue>,
    #[serde(rename = "Dependents")]
    pub dependents: Option<FieldValue>,
    #[serde(rename = "Education")]
    pub education: Option<FieldValue>,
    #[serde(rename = "Self_Employed")]
    pub self_employed: Option<FieldValue>,
    #[serde(rename = "ApplicantIncome")]
    pub applicant_income: Option<FieldValue>,
    #[serde(rename = "CoapplicantIncome")]
    pub coapplicant_income: Option<FieldValue>,
    #[serde(rename = "LoanAmount")]
    pub loan_amount: Option<FieldValue>,
    #[serde(rename = "Loan_Amount_Term")]
    pub loan_amount_term: Option<FieldValue>,
    #[serde(rename = "Credit_History")]
    pub credit_history: Option<FieldValue>,
    #[serde(rename = "Property_Area")]
    pub property_area: Option<FieldValue>,
}

impl ApplicantSubmission {
    /// Build a submission from raw cells, e.g. one CSV row. Blank cells count as missing.
    pub fn from_cells<'a, F>(mut cell: F) -> Self
    where
        F: FnMut(Feature) -> Option<&'a str>,
    {
        let mut submission = Self::default();
        for feature in Feature::ALL {
            let value = cell(feature)
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .map(FieldValue::from);
            *submission.slot_mut(feature) = value;
        }
        submission
    }

    pub fn get(&self, feature: Feature) -> Option<&FieldValue> {
        match feature {
            Feature::Gender => self.gender.as_ref(),
            Feature::Married => self.married.as_ref(),
            Feature::Dependents => self.dependents.as_ref(),
            Feature::Education => self.education.as_ref(),
            Feature::SelfEmployed => self.self_employed.as_ref(),
            Feature::ApplicantIncome => self.applicant_income.as_ref(),
            Feature::CoapplicantIncome => self.coapplicant_income.as_ref(),
            Feature::LoanAmount => self.loan_amount.as_ref(),
            Feature::LoanAmountTerm => self.loan_amount_term.as_ref(),
            Feature::CreditHistory => self.credit_history.as_ref(),
            Feature::PropertyArea => self.property_area.as_ref(),
        }
    }

    fn slot_mut(&mut self, feature: Feature) -> &mut Option<FieldValue> {
        match feature {
            Feature::Gender => &mut self.gender,
            Feature::Married => &mut self.married,
            Feature::Dependents => &mut self.dependents,
            Feature::Education => &mut self.education,
            Feature::SelfEmployed => &mut self.self_employed,
            Feature::ApplicantIncome => &mut self.applicant_income,
            Feature::CoapplicantIncome => &mut self.coapplicant_income,
            Feature::LoanAmount => &mut self.loan_amount,
            Feature::LoanAmountTerm => &mut self.loan_amount_term,
            Feature::CreditHistory => &mut self.credit_history,
            Feature::PropertyArea => &mut self.property_area,
        }
    }

    /// Check every field against its domain and produce a typed record.
    ///
    /// Categorical values are only checked for presence here; membership in the
    /// training-time label table is the encoder's job.
    pub fn validate(&self) -> Result<ApplicantRecord, ValidationError> {
        let record = ApplicantRecord {
            gender: self.category(Feature::Gender)?,
            married: self.category(Feature::Married)?,
            dependents: self.category(Feature::Dependents)?,
            education: self.category(Feature::Education)?,
            self_employed: self.category(Feature::SelfEmployed)?,
            applicant_income: self.bounded(Feature::ApplicantIncome, 1)?,
            coapplicant_income: self.bounded(Feature::CoapplicantIncome, 0)?,
            loan_amount: self.bounded(Feature::LoanAmount, 1)?,
            loan_amount_term: self.bounded(Feature::LoanAmountTerm, 1)?,
            credit_history: self.credit_history()?,
            property_area: self.category(Feature::PropertyArea)?,
        };
        Ok(record)
    }

    fn require(&self, field: Feature) -> Result<&FieldValue, ValidationError> {
        self.get(field)
            .ok_or(ValidationError::MissingField { field })
    }

    fn category(&self, field: Feature) -> Result<String, ValidationError> {
        let text = match self.require(field)? {
            FieldValue::Text(raw) => raw.trim().to_string(),
            FieldValue::Integer(value) => value.to_string(),
            FieldValue::Float(value) => whole_number(*value)
                .map(|value| value.to_string())
                .ok_or_else(|| ValidationError::InvalidField {
                    field,
                    reason: format!("expected a category label, found {value}"),
                })?,
            FieldValue::Unsupported(value) => {
                return Err(ValidationError::InvalidField {
                    field,
                    reason: format!(
                        "expected a category label, found {}",
                        FieldValue::unsupported_kind(value)
                    ),
                })
            }
        };

        if text.is_empty() {
            return Err(ValidationError::MissingField { field });
        }
        Ok(text)
    }

    fn integer(&self, field: Feature) -> Result<i64, ValidationError> {
        let malformed = |found: String| ValidationError::InvalidField {
            field,
            reason: format!("expected a whole number, found '{found}'"),
        };

        match self.require(field)? {
            FieldValue::Integer(value) => Ok(*value),
            FieldValue::Float(value) => whole_number(*value).ok_or_else(|| malformed(value.to_string())),
            FieldValue::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::MissingField { field });
                }
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_number))
                    .ok_or_else(|| malformed(trimmed.to_string()))
            }
            FieldValue::Unsupported(value) => {
                Err(malformed(FieldValue::unsupported_kind(value).to_string()))
            }
        }
    }

    fn bounded(&self, field: Feature, minimum: i64) -> Result<u32, ValidationError> {
        let value = self.integer(field)?;
        if value < minimum {
            let bound = if minimum == 0 {
                "must not be negative"
            } else {
                "must be greater than zero"
            };
            return Err(ValidationError::InvalidField {
                field,
                reason: format!("{bound}, found {value}"),
            });
        }
        u32::try_from(value).map_err(|_| ValidationError::InvalidField {
            field,
            reason: format!("{value} is out of range"),
        })
    }

    fn credit_history(&self) -> Result<u8, ValidationError> {
        let field = Feature::CreditHistory;
        match self.integer(field)? {
            0 => Ok(0),
            1 => Ok(1),
            other => Err(ValidationError::InvalidField {
                field,
                reason: format!("must be 0 or 1, found {other}"),
            }),
        }
    }
}

fn whole_number(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Validated applicant attributes. `loan_amount` is always in whole currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Married")]
    pub married: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    #[serde(rename = "Education")]
    pub education: String,
    #[serde(rename = "Self_Employed")]
    pub self_employed: String,
    #[serde(rename = "ApplicantIncome")]
    pub applicant_income: u32,
    #[serde(rename = "CoapplicantIncome")]
    pub coapplicant_income: u32,
    #[serde(rename = "LoanAmount")]
    pub loan_amount: u32,
    #[serde(rename = "Loan_Amount_Term")]
    pub loan_amount_term: u32,
    #[serde(rename = "Credit_History")]
    pub credit_history: u8,
    #[serde(rename = "Property_Area")]
    pub property_area: String,
}

/// Borrowed view of one record field, keyed by [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Category(&'a str),
    Amount(f64),
}

impl ApplicantRecord {
    pub fn value(&self, feature: Feature) -> FieldRef<'_> {
        match feature {
            Feature::Gender => FieldRef::Category(&self.gender),
            Feature::Married => FieldRef::Category(&self.married),
            Feature::Dependents => FieldRef::Category(&self.dependents),
            Feature::Education => FieldRef::Category(&self.education),
            Feature::SelfEmployed => FieldRef::Category(&self.self_employed),
            Feature::ApplicantIncome => FieldRef::Amount(f64::from(self.applicant_income)),
            Feature::CoapplicantIncome => FieldRef::Amount(f64::from(self.coapplicant_income)),
            Feature::LoanAmount => FieldRef::Amount(f64::from(self.loan_amount)),
            Feature::LoanAmountTerm => FieldRef::Amount(f64::from(self.loan_amount_term)),
            Feature::CreditHistory => FieldRef::Amount(f64::from(self.credit_history)),
            Feature::PropertyArea => FieldRef::Category(&self.property_area),
        }
    }
}

/// Client-facing input errors, each naming the offending field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: Feature },
    #[error("{field} is invalid: {reason}")]
    InvalidField { field: Feature, reason: String },
    #[error("{field} value '{value}' was not seen during training")]
    UnknownCategory { field: Feature, value: String },
}

impl ValidationError {
    pub fn field(&self) -> Feature {
        match self {
            ValidationError::MissingField { field }
            | ValidationError::InvalidField { field, .. }
            | ValidationError::UnknownCategory { field, .. } => *field,
        }
    }
}

/// Signed contribution of one feature toward the Approved class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureAttribution {
    pub feature: Feature,
    pub attribution: f64,
}

/// Attributions ranked by magnitude, largest first.
///
/// Serializes as a JSON object whose key order follows the ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Explanation {
    ranked: Vec<FeatureAttribution>,
}

impl Explanation {
    pub fn from_ranked(ranked: Vec<FeatureAttribution>) -> Self {
        Self { ranked }
    }

    /// The explanation reported when no explainer artifact is loaded.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn ranked(&self) -> &[FeatureAttribution] {
        &self.ranked
    }

    pub fn top_factor(&self) -> Option<Feature> {
        self.ranked.first().map(|entry| entry.feature)
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.ranked
            .iter()
            .find(|entry| entry.feature == feature)
            .map(|entry| entry.attribution)
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

impl Serialize for Explanation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ranked.len()))?;
        for entry in &self.ranked {
            map.serialize_entry(entry.feature.column(), &round_to(entry.attribution, 4))?;
        }
        map.end()
    }
}

/// Outcome of one pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub prediction: u8,
    #[serde(serialize_with = "serialize_probability")]
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub explanation: Explanation,
    pub improvement_tips: Vec<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_money"
    )]
    pub estimated_emi: Option<f64>,
}

impl PredictionResult {
    pub fn is_approved(&self) -> bool {
        self.prediction == 1
    }

    pub fn decision_label(&self) -> &'static str {
        if self.is_approved() {
            "Approved"
        } else {
            "Rejected"
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn serialize_probability<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 4))
}

fn serialize_money<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(amount) => serializer.serialize_f64(round_to(*amount, 2)),
        None => serializer.serialize_none(),
    }
}
