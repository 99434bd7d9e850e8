use super::common::*;
use crate::lending::batch::{process_csv, BatchError};
use crate::lending::pipeline::PredictionPipeline;

const HEADER: &str = "Loan_ID,Gender,Married,Dependents,Education,Self_Employed,ApplicantIncome,CoapplicantIncome,LoanAmount,Loan_Amount_Term,Credit_History,Property_Area";

fn score(input: &str) -> (Result<crate::lending::BatchSummary, BatchError>, Vec<Vec<String>>) {
    let pipeline = PredictionPipeline::new(model());
    let mut output = Vec::new();
    let summary = process_csv(&pipeline, input.as_bytes(), &mut output);
    let rows = csv::Reader::from_reader(output.as_slice())
        .records()
        .map(|record| {
            record
                .expect("output parses")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect();
    (summary, rows)
}

#[test]
fn one_bad_row_becomes_an_error_row_in_place() {
    let input = format!(
        "{HEADER}\n\
         LP001,Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n\
         LP002,Other,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n\
         LP003,Male,No,0,Graduate,No,2500,0,250000,360,0,Rural\n"
    );
    let (summary, rows) = score(&input);
    let summary = summary.expect("batch completes");
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0][0], "LP001");
    assert_eq!(rows[0][12..], ["Approved", "0.8730", "Low Risk", "Credit_History"]);

    assert_eq!(rows[1][0], "LP002");
    assert_eq!(rows[1][12..15], ["ERROR", "0", "N/A"]);
    assert!(rows[1][15].contains("Other"));

    assert_eq!(rows[2][0], "LP003");
    assert_eq!(rows[2][12], "Rejected");
    assert_eq!(rows[2][14], "High Risk");
}

#[test]
fn output_header_appends_result_columns() {
    let input = format!("{HEADER}\nLP001,Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n");
    let pipeline = PredictionPipeline::new(model());
    let mut output = Vec::new();
    process_csv(&pipeline, input.as_bytes(), &mut output).expect("batch completes");
    let text = String::from_utf8(output).expect("utf-8 output");
    let header = text.lines().next().expect("header line");
    assert_eq!(
        header,
        format!("{HEADER},Prediction,Probability,Risk_Level,Top_Factor")
    );
}

#[test]
fn blank_cells_fail_only_their_row() {
    let input = format!(
        "{HEADER}\n\
         LP010,Male,Yes,0,Graduate,No,6000,2000,,360,1,Urban\n\
         LP011,Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n"
    );
    let (summary, rows) = score(&input);
    assert_eq!(summary.expect("batch completes").failed, 1);
    assert_eq!(rows[0][12], "ERROR");
    assert!(rows[0][15].contains("LoanAmount"));
    assert_eq!(rows[1][12], "Approved");
}

#[test]
fn missing_required_columns_reject_the_file() {
    let input = "Gender,Married\nMale,Yes\n";
    let (summary, _) = score(input);
    match summary {
        Err(BatchError::MissingColumns(columns)) => {
            assert!(columns.contains(&"ApplicantIncome".to_string()));
            assert!(columns.contains(&"Property_Area".to_string()));
            assert!(!columns.contains(&"Gender".to_string()));
        }
        other => panic!("expected missing columns, got {other:?}"),
    }
}

#[test]
fn missing_explainer_leaves_top_factor_blank() {
    let pipeline = PredictionPipeline::new(model_with_explainer(None));
    let input = format!("{HEADER}\nLP001,Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n");
    let mut output = Vec::new();
    process_csv(&pipeline, input.as_bytes(), &mut output).expect("batch completes");
    let text = String::from_utf8(output).expect("utf-8 output");
    let row = text.lines().nth(1).expect("data row");
    assert!(row.ends_with("Approved,0.8730,Low Risk,"));
}

#[test]
fn invalid_utf8_row_keeps_its_original_cells() {
    let mut input = format!("{HEADER}\n").into_bytes();
    input.extend_from_slice(b"LP020,Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urb\xffan\n");
    input.extend_from_slice(b"LP021,Male,Yes,0,Graduate,No,6000,2000,120000,360,1,Urban\n");

    let pipeline = PredictionPipeline::new(model());
    let mut output = Vec::new();
    let summary = process_csv(&pipeline, input.as_slice(), &mut output).expect("batch completes");
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.failed, 1);

    let rows: Vec<Vec<String>> = csv::Reader::from_reader(output.as_slice())
        .records()
        .map(|record| {
            record
                .expect("output parses")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect();
    assert_eq!(rows[0][0], "LP020");
    assert_eq!(rows[0][6], "6000");
    assert_eq!(rows[0][11], "Urb\u{fffd}an");
    assert_eq!(rows[0][12..15], ["ERROR", "0", "N/A"]);
    assert!(rows[0][15].contains("UTF-8"));
    assert_eq!(rows[1][0], "LP021");
    assert_eq!(rows[1][12], "Approved");
}
