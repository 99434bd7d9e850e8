use std::collections::BTreeMap;

use super::common::*;
use crate::lending::domain::{Feature, ValidationError};
use crate::lending::model::{ArtifactError, EncodingStrategy, FeatureEncoder, FeatureSchema};

fn encoder() -> FeatureEncoder {
    FeatureEncoder::new(FeatureSchema::from_label_tables(label_tables()).expect("fixture tables"))
}

#[test]
fn encodes_in_training_column_order() {
    let encoded = encoder()
        .encode(&record(strong_payload()))
        .expect("strong applicant encodes");
    assert_eq!(
        encoded.0,
        [1.0, 1.0, 0.0, 0.0, 0.0, 6000.0, 2000.0, 120.0, 360.0, 1.0, 2.0]
    );
}

#[test]
fn encoding_is_deterministic() {
    let encoder = encoder();
    let applicant = record(weak_payload());
    let first = encoder.encode(&applicant).expect("encodes");
    let second = encoder.encode(&applicant).expect("encodes");
    assert_eq!(first, second);
}

#[test]
fn loan_amount_is_rescaled_once_and_record_keeps_real_value() {
    let applicant = record(strong_payload());
    let encoded = encoder().encode(&applicant).expect("encodes");
    assert_eq!(encoded.get(Feature::LoanAmount), 120.0);
    assert_eq!(applicant.loan_amount, 120_000);
}

#[test]
fn unseen_category_is_reported_not_defaulted() {
    let mut payload = strong_payload();
    payload["Gender"] = "Other".into();
    let err = encoder()
        .encode(&record(payload))
        .expect_err("unseen gender must fail");
    assert_eq!(
        err,
        ValidationError::UnknownCategory {
            field: Feature::Gender,
            value: "Other".to_string(),
        }
    );
}

#[test]
fn schema_resolves_strategies_per_column() {
    let schema = FeatureSchema::from_label_tables(label_tables()).expect("fixture tables");
    assert!(matches!(
        schema.strategy(Feature::PropertyArea),
        EncodingStrategy::Categorical(table) if table.classes().len() == 3
    ));
    assert_eq!(
        schema.strategy(Feature::LoanAmount),
        &EncodingStrategy::Rescaled { divisor: 1000.0 }
    );
    assert_eq!(
        schema.strategy(Feature::CreditHistory),
        &EncodingStrategy::Passthrough
    );
}

#[test]
fn schema_requires_every_categorical_table() {
    let mut tables: BTreeMap<String, Vec<String>> = label_tables();
    tables.remove("Education");
    match FeatureSchema::from_label_tables(tables) {
        Err(ArtifactError::MissingLabelTable { column }) => {
            assert_eq!(column, Feature::Education)
        }
        other => panic!("expected missing table, got {other:?}"),
    }
}
