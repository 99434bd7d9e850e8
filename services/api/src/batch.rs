use clap::Args;
use loanguard::config::AppConfig;
use loanguard::error::AppError;
use loanguard::lending::{process_csv, BatchSummary, ModelContext, PredictionPipeline};
use loanguard::telemetry;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV file with one applicant per row
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Destination for the annotated CSV
    #[arg(long)]
    pub(crate) output: PathBuf,
    /// Override the directory holding the model artifacts
    #[arg(long)]
    pub(crate) model_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    input: &'a Path,
    output: &'a Path,
    rows: usize,
    failed: usize,
}

pub(crate) fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(dir) = args.model_dir.clone() {
        config.model.artifacts_dir = dir;
    }
    telemetry::init(&config.telemetry)?;

    let model = ModelContext::load(&config.model.artifacts_dir)?;
    let pipeline = PredictionPipeline::new(Arc::new(model));
    let summary = score_file(&pipeline, &args.input, &args.output)?;

    let report = BatchReport {
        input: &args.input,
        output: &args.output,
        rows: summary.rows,
        failed: summary.failed,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => info!(error = %err, "unable to render batch report"),
    }
    Ok(())
}

pub(crate) fn score_file(
    pipeline: &PredictionPipeline,
    input: &Path,
    output: &Path,
) -> Result<BatchSummary, AppError> {
    let reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    let summary = process_csv(pipeline, reader, writer)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        rows = summary.rows,
        failed = summary.failed,
        "offline batch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn score_file_writes_annotated_rows() {
        let dir = std::env::temp_dir().join(format!("loanguard-api-batch-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("scratch dir");
        let input = dir.join("applicants.csv");
        let output = dir.join("scored.csv");
        fs::write(
            &input,
            "Gender,Married,Dependents,Education,Self_Employed,ApplicantIncome,CoapplicantIncome,LoanAmount,Loan_Amount_Term,Credit_History,Property_Area\n\
             Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n\
             Male,Yes,0,Graduate,No,-5,2000,120000,360,1,Urban\n",
        )
        .expect("write input");

        let models = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../models");
        let model = ModelContext::load(models).expect("shipped artifacts load");
        let pipeline = PredictionPipeline::new(Arc::new(model));

        let summary = score_file(&pipeline, &input, &output).expect("batch completes");
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.failed, 1);

        let scored = fs::read_to_string(&output).expect("read output");
        let lines: Vec<&str> = scored.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("Approved,0.8730,Low Risk,Credit_History"));
        assert!(lines[2].contains(",ERROR,0,N/A,"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let models = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../models");
        let model = ModelContext::load(models).expect("shipped artifacts load");
        let pipeline = PredictionPipeline::new(Arc::new(model));
        let missing = std::env::temp_dir().join("loanguard-no-such-input.csv");
        let output = std::env::temp_dir().join("loanguard-no-such-output.csv");

        assert!(matches!(
            score_file(&pipeline, &missing, &output),
            Err(AppError::Io(_))
        ));
    }
}
