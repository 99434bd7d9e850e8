//! Immutable model state loaded once at startup from the training artifacts.

pub mod classifier;
pub mod encoder;
pub mod explainer;
pub mod scaler;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::lending::domain::{Feature, FEATURE_COUNT};

pub use classifier::{ClassifierArtifact, LogisticClassifier};
pub use encoder::{
    EncodedFeatureVector, EncodingStrategy, FeatureEncoder, FeatureSchema, LabelTable,
    LOAN_AMOUNT_DIVISOR,
};
pub use explainer::{improvement_tips, ExplainerArtifact, LinearExplainer};
pub use scaler::{ScaledFeatureVector, ScalerArtifact, StandardScaler};

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const LABEL_ENCODERS_FILE: &str = "label_encoders.json";
pub const EXPLAINER_FILE: &str = "explainer.json";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{artifact} has {found} values, expected {expected}")]
    Shape {
        artifact: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{artifact} was fit on columns {found:?}, expected {expected:?}")]
    ColumnOrder {
        artifact: &'static str,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("label encoder table for {column} is missing or empty")]
    MissingLabelTable { column: Feature },
}

/// Encoder, scaler, classifier, and optional explainer shared by every request.
#[derive(Debug, Clone)]
pub struct ModelContext {
    pub encoder: FeatureEncoder,
    pub scaler: StandardScaler,
    pub classifier: LogisticClassifier,
    pub explainer: Option<LinearExplainer>,
}

impl ModelContext {
    pub fn from_parts(
        encoder: FeatureEncoder,
        scaler: StandardScaler,
        classifier: LogisticClassifier,
        explainer: Option<LinearExplainer>,
    ) -> Self {
        Self {
            encoder,
            scaler,
            classifier,
            explainer,
        }
    }

    /// Load all artifacts from `dir`. Only the explainer is optional.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        info!(path = %dir.display(), "loading model artifacts");

        let tables: BTreeMap<String, Vec<String>> = read_json(&dir.join(LABEL_ENCODERS_FILE))?;
        let schema = FeatureSchema::from_label_tables(tables)?;

        let scaler: ScalerArtifact = read_json(&dir.join(SCALER_FILE))?;
        check_columns(SCALER_FILE, scaler.feature_names.as_deref())?;
        let scaler = StandardScaler::new(
            fixed(SCALER_FILE, scaler.mean)?,
            fixed(SCALER_FILE, scaler.scale)?,
        );

        let classifier: ClassifierArtifact = read_json(&dir.join(CLASSIFIER_FILE))?;
        check_columns(CLASSIFIER_FILE, classifier.feature_names.as_deref())?;
        let classifier = LogisticClassifier::new(
            fixed(CLASSIFIER_FILE, classifier.coefficients)?,
            classifier.intercept,
        );

        let explainer = load_explainer(&dir.join(EXPLAINER_FILE));

        info!(
            features = FEATURE_COUNT,
            explainer = explainer.is_some(),
            "model artifacts loaded"
        );

        Ok(Self::from_parts(
            FeatureEncoder::new(schema),
            scaler,
            classifier,
            explainer,
        ))
    }
}

fn load_explainer(path: &Path) -> Option<LinearExplainer> {
    if !path.exists() {
        warn!(path = %path.display(), "explainer artifact not found; explanations disabled");
        return None;
    }

    let artifact = read_json::<ExplainerArtifact>(path)
        .and_then(|artifact| fixed(EXPLAINER_FILE, artifact.baseline));
    match artifact {
        Ok(baseline) => Some(LinearExplainer::new(baseline)),
        Err(err) => {
            warn!(error = %err, "explainer artifact unusable; explanations disabled");
            None
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn fixed(artifact: &'static str, values: Vec<f64>) -> Result<[f64; FEATURE_COUNT], ArtifactError> {
    let found = values.len();
    values.try_into().map_err(|_| ArtifactError::Shape {
        artifact,
        expected: FEATURE_COUNT,
        found,
    })
}

fn check_columns(artifact: &'static str, names: Option<&[String]>) -> Result<(), ArtifactError> {
    let Some(names) = names else {
        return Ok(());
    };

    let expected: Vec<String> = Feature::ALL
        .iter()
        .map(|feature| feature.column().to_string())
        .collect();
    if names != expected.as_slice() {
        return Err(ArtifactError::ColumnOrder {
            artifact,
            expected,
            found: names.to_vec(),
        });
    }
    Ok(())
}
