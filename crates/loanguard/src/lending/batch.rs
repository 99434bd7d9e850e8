//! CSV batch scoring. One bad row never aborts the file.

use std::io::{Read, Write};

use tracing::{info, warn};

use super::domain::{ApplicantSubmission, Feature, FEATURE_COUNT};
use super::pipeline::{PredictionMode, PredictionPipeline};

pub const OUTPUT_COLUMNS: [&str; 4] = ["Prediction", "Probability", "Risk_Level", "Top_Factor"];

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub rows: usize,
    pub failed: usize,
}

/// Score every row of `reader` and write the annotated rows to `writer` in input order.
pub fn process_csv<R: Read, W: Write>(
    pipeline: &PredictionPipeline,
    reader: R,
    writer: W,
) -> Result<BatchSummary, BatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut positions = [0usize; FEATURE_COUNT];
    let mut missing = Vec::new();
    for feature in Feature::ALL {
        match headers.iter().position(|header| header == feature.column()) {
            Some(position) => positions[feature.index()] = position,
            None => missing.push(feature.column().to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(BatchError::MissingColumns(missing));
    }

    let mut writer = csv::Writer::from_writer(writer);
    let mut header_row: Vec<&str> = headers.iter().collect();
    header_row.extend(OUTPUT_COLUMNS);
    writer.write_record(&header_row)?;

    let mut summary = BatchSummary::default();
    for (index, record) in reader.byte_records().enumerate() {
        summary.rows += 1;
        let line = index + 2;

        let record = match record.map(csv::StringRecord::from_byte_record) {
            Ok(Ok(record)) => record,
            Ok(Err(err)) => {
                summary.failed += 1;
                warn!(line, error = %err.utf8_error(), "batch row is not valid utf-8");
                let raw = err.into_byte_record();
                let mut row: Vec<String> = (0..headers.len())
                    .map(|column| {
                        raw.get(column)
                            .map(|cell| String::from_utf8_lossy(cell).into_owned())
                            .unwrap_or_default()
                    })
                    .collect();
                row.extend(error_columns("row contains invalid UTF-8"));
                writer.write_record(&row)?;
                continue;
            }
            Err(err) => {
                summary.failed += 1;
                warn!(line, error = %err, "unreadable batch row");
                let mut row = vec![String::new(); headers.len()];
                row.extend(error_columns(&err.to_string()));
                writer.write_record(&row)?;
                continue;
            }
        };

        let submission =
            ApplicantSubmission::from_cells(|feature| record.get(positions[feature.index()]));
        let scored = submission
            .validate()
            .and_then(|applicant| pipeline.run(&applicant, PredictionMode::Batch));

        let mut row: Vec<String> = (0..headers.len())
            .map(|column| record.get(column).unwrap_or_default().to_string())
            .collect();
        match scored {
            Ok(result) => row.extend([
                result.decision_label().to_string(),
                format!("{:.4}", result.probability),
                result.risk_level.label().to_string(),
                result
                    .explanation
                    .top_factor()
                    .map(|feature| feature.column().to_string())
                    .unwrap_or_default(),
            ]),
            Err(err) => {
                summary.failed += 1;
                warn!(line, field = %err.field(), error = %err, "batch row rejected");
                row.extend(error_columns(&err.to_string()));
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    info!(rows = summary.rows, failed = summary.failed, "batch scored");
    Ok(summary)
}

fn error_columns(message: &str) -> [String; 4] {
    [
        "ERROR".to_string(),
        "0".to_string(),
        "N/A".to_string(),
        message.to_string(),
    ]
}
