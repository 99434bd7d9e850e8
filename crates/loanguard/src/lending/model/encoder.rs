//! Training-time label tables and the per-column encoding schema.

use std::collections::{BTreeMap, HashMap};

use crate::lending::domain::{ApplicantRecord, Feature, FieldRef, ValidationError, FEATURE_COUNT};

use super::ArtifactError;

/// Training data stored LoanAmount in thousands.
pub const LOAN_AMOUNT_DIVISOR: f64 = 1000.0;

/// Ordered classes of one categorical column. The position of a class is its code.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelTable {
    pub fn new(classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code))
            .collect();
        Self { classes, index }
    }

    pub fn code(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodingStrategy {
    Categorical(LabelTable),
    Passthrough,
    Rescaled { divisor: f64 },
}

/// Encoding strategy for every column, in [`Feature::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    strategies: Vec<(Feature, EncodingStrategy)>,
}

impl FeatureSchema {
    /// Resolve the schema from the `label_encoders.json` contents.
    ///
    /// Every categorical column needs a table. Tables for other columns are ignored.
    pub fn from_label_tables(
        mut tables: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ArtifactError> {
        let mut strategies = Vec::with_capacity(FEATURE_COUNT);
        for feature in Feature::ALL {
            let strategy = if feature.is_categorical() {
                let classes = tables
                    .remove(feature.column())
                    .ok_or(ArtifactError::MissingLabelTable { column: feature })?;
                if classes.is_empty() {
                    return Err(ArtifactError::MissingLabelTable { column: feature });
                }
                EncodingStrategy::Categorical(LabelTable::new(classes))
            } else if feature == Feature::LoanAmount {
                EncodingStrategy::Rescaled {
                    divisor: LOAN_AMOUNT_DIVISOR,
                }
            } else {
                EncodingStrategy::Passthrough
            };
            strategies.push((feature, strategy));
        }
        Ok(Self { strategies })
    }

    pub fn strategy(&self, feature: Feature) -> &EncodingStrategy {
        &self.strategies[feature.index()].1
    }
}

/// Model-space features before scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedFeatureVector(pub [f64; FEATURE_COUNT]);

impl EncodedFeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }
}

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
}

impl FeatureEncoder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encode(&self, record: &ApplicantRecord) -> Result<EncodedFeatureVector, ValidationError> {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, (feature, strategy)) in values.iter_mut().zip(&self.schema.strategies) {
            *slot = encode_field(*feature, strategy, record.value(*feature))?;
        }
        Ok(EncodedFeatureVector(values))
    }
}

fn encode_field(
    feature: Feature,
    strategy: &EncodingStrategy,
    value: FieldRef<'_>,
) -> Result<f64, ValidationError> {
    match (strategy, value) {
        (EncodingStrategy::Categorical(table), FieldRef::Category(label)) => table
            .code(label)
            .map(|code| code as f64)
            .ok_or_else(|| ValidationError::UnknownCategory {
                field: feature,
                value: label.to_string(),
            }),
        (EncodingStrategy::Passthrough, FieldRef::Amount(amount)) => Ok(amount),
        (EncodingStrategy::Rescaled { divisor }, FieldRef::Amount(amount)) => Ok(amount / divisor),
        (_, FieldRef::Category(label)) => Err(ValidationError::InvalidField {
            field: feature,
            reason: format!("expected a number, found '{label}'"),
        }),
        (EncodingStrategy::Categorical(_), FieldRef::Amount(amount)) => {
            Err(ValidationError::InvalidField {
                field: feature,
                reason: format!("expected a category label, found {amount}"),
            })
        }
    }
}
