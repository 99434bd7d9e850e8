use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loanguard::lending::{
    ApplicantSubmission, ArtifactError, Feature, ModelContext, PredictionMode, PredictionPipeline,
    RiskLevel,
};
use serde_json::json;

fn shipped_models() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../models")
}

/// Copy of the shipped artifacts in a scratch directory the test may modify.
fn scratch_models(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("loanguard-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    for file in [
        "classifier.json",
        "scaler.json",
        "label_encoders.json",
        "explainer.json",
    ] {
        fs::copy(shipped_models().join(file), dir.join(file)).expect("copy artifact");
    }
    dir
}

fn applicant() -> ApplicantSubmission {
    serde_json::from_value(json!({
        "Gender": "Female",
        "Married": "No",
        "Dependents": "1",
        "Education": "Graduate",
        "Self_Employed": "No",
        "ApplicantIncome": 4583,
        "CoapplicantIncome": 1508,
        "LoanAmount": 128000,
        "Loan_Amount_Term": 360,
        "Credit_History": 1,
        "Property_Area": "Semiurban"
    }))
    .expect("payload parses")
}

#[test]
fn shipped_artifacts_load_and_score() {
    let model = ModelContext::load(shipped_models()).expect("shipped artifacts load");
    assert!(model.explainer.is_some());

    let pipeline = PredictionPipeline::new(Arc::new(model));
    let record = applicant().validate().expect("applicant validates");
    let result = pipeline
        .run(&record, PredictionMode::Eligibility)
        .expect("applicant scores");

    assert_eq!(result.prediction, 1);
    assert_ne!(result.risk_level, RiskLevel::High);
    assert_eq!(result.explanation.top_factor(), Some(Feature::CreditHistory));
    assert!(result.estimated_emi.unwrap_or_default() > 0.0);
}

#[test]
fn missing_explainer_is_not_fatal() {
    let dir = scratch_models("no-explainer");
    fs::remove_file(dir.join("explainer.json")).expect("remove explainer");

    let model = ModelContext::load(&dir).expect("loads without explainer");
    assert!(model.explainer.is_none());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn malformed_explainer_is_not_fatal() {
    let dir = scratch_models("bad-explainer");
    fs::write(dir.join("explainer.json"), r#"{"baseline": [0.0, 0.0]}"#).expect("write explainer");

    let model = ModelContext::load(&dir).expect("loads with unusable explainer");
    assert!(model.explainer.is_none());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn short_coefficient_vector_fails_to_load() {
    let dir = scratch_models("short-classifier");
    fs::write(
        dir.join("classifier.json"),
        r#"{"coefficients": [0.1, 0.2, 0.3], "intercept": 0.0}"#,
    )
    .expect("write classifier");

    match ModelContext::load(&dir) {
        Err(ArtifactError::Shape {
            artifact,
            expected,
            found,
        }) => {
            assert_eq!(artifact, "classifier.json");
            assert_eq!(expected, 11);
            assert_eq!(found, 3);
        }
        other => panic!("expected shape error, got {other:?}"),
    }
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn reordered_scaler_columns_fail_to_load() {
    let dir = scratch_models("reordered-scaler");
    let mut names: Vec<&str> = Feature::ALL.iter().map(|feature| feature.column()).collect();
    names.swap(0, 1);
    let scaler = json!({
        "mean": vec![0.0; 11],
        "scale": vec![1.0; 11],
        "feature_names": names,
    });
    fs::write(dir.join("scaler.json"), scaler.to_string()).expect("write scaler");

    assert!(matches!(
        ModelContext::load(&dir),
        Err(ArtifactError::ColumnOrder { artifact: "scaler.json", .. })
    ));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_artifact_directory_is_an_io_error() {
    let dir = std::env::temp_dir().join("loanguard-does-not-exist");
    assert!(matches!(
        ModelContext::load(dir),
        Err(ArtifactError::Io { .. })
    ));
}
