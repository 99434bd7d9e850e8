use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::batch::BatchError;
use super::domain::ApplicantSubmission;
use super::repository::{AlertNotifier, DecisionStore};
use super::service::{LoanDecisionService, ServiceError};

pub const BATCH_FILE_FIELD: &str = "file";
pub const BATCH_RESULT_FILENAME: &str = "loan_predictions.csv";

/// Router builder exposing prediction, monitoring, and reporting endpoints.
pub fn decision_router<S, N>(service: Arc<LoanDecisionService<S, N>>) -> Router
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    Router::new()
        .route("/predict", post(predict_handler::<S, N>))
        .route("/check-eligibility", post(eligibility_handler::<S, N>))
        .route("/batch-predict", post(batch_handler::<S, N>))
        .route("/drift-status", get(drift_handler::<S, N>))
        .route("/applications", get(applications_handler::<S, N>))
        .route("/stats", get(stats_handler::<S, N>))
        .route("/analytics/trends", get(trends_handler::<S, N>))
        .route("/analytics/income-bracket", get(income_bracket_handler::<S, N>))
        .route("/analytics/risk", get(risk_handler::<S, N>))
        .route("/analytics/loan-amount", get(loan_amount_handler::<S, N>))
        .route("/analytics/property-area", get(property_area_handler::<S, N>))
        .with_state(service)
}

type SharedService<S, N> = State<Arc<LoanDecisionService<S, N>>>;

pub(crate) async fn predict_handler<S, N>(
    State(service): SharedService<S, N>,
    body: Result<axum::Json<ApplicantSubmission>, JsonRejection>,
) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    let submission = match body {
        Ok(axum::Json(submission)) => submission,
        Err(rejection) => return rejected_body(rejection),
    };
    run_blocking(service, move |service| service.predict(&submission)).await
}

pub(crate) async fn eligibility_handler<S, N>(
    State(service): SharedService<S, N>,
    body: Result<axum::Json<ApplicantSubmission>, JsonRejection>,
) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    let submission = match body {
        Ok(axum::Json(submission)) => submission,
        Err(rejection) => return rejected_body(rejection),
    };
    run_blocking(service, move |service| service.check_eligibility(&submission)).await
}

pub(crate) async fn batch_handler<S, N>(
    State(service): SharedService<S, N>,
    mut multipart: Multipart,
) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    let upload = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(BATCH_FILE_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if !filename.to_ascii_lowercase().ends_with(".csv") {
                    return bad_request("Only CSV files are supported");
                }
                match field.bytes().await {
                    Ok(bytes) => break bytes,
                    Err(err) => return bad_request(&err.body_text()),
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => return bad_request("No file uploaded"),
            Err(err) => return bad_request(&err.body_text()),
        }
    };

    let scored = tokio::task::spawn_blocking(move || {
        let mut output = Vec::new();
        service
            .batch_predict(upload.as_ref(), &mut output)
            .map(|summary| (summary, output))
    })
    .await;

    match scored {
        Ok(Ok((_, output))) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={BATCH_RESULT_FILENAME}"),
                ),
            ],
            output,
        )
            .into_response(),
        Ok(Err(err)) => error_response(err),
        Err(join_error) => task_failed(join_error),
    }
}

pub(crate) async fn drift_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.drift_status(Utc::now())).await
}

pub(crate) async fn applications_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.applications()).await
}

pub(crate) async fn stats_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.stats()).await
}

pub(crate) async fn trends_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.trends(Utc::now())).await
}

pub(crate) async fn income_bracket_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.income_brackets()).await
}

pub(crate) async fn risk_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.risk_distribution()).await
}

pub(crate) async fn loan_amount_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.loan_amount_distribution()).await
}

pub(crate) async fn property_area_handler<S, N>(State(service): SharedService<S, N>) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    run_blocking(service, |service| service.property_area_stats()).await
}

/// Run a service call on the blocking pool; store adapters may do file I/O.
async fn run_blocking<S, N, T, F>(service: Arc<LoanDecisionService<S, N>>, work: F) -> Response
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
    T: Serialize + Send + 'static,
    F: FnOnce(&LoanDecisionService<S, N>) -> Result<T, ServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || work(&service)).await {
        Ok(Ok(body)) => (StatusCode::OK, axum::Json(body)).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(join_error) => task_failed(join_error),
    }
}

fn task_failed(join_error: tokio::task::JoinError) -> Response {
    warn!(error = %join_error, "decision task failed");
    let payload = json!({ "error": "internal error" });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}

fn rejected_body(rejection: JsonRejection) -> Response {
    let payload = json!({ "error": rejection.body_text() });
    (rejection.status(), axum::Json(payload)).into_response()
}

fn bad_request(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(error) => {
            let payload = json!({
                "error": error.to_string(),
                "field": error.field().column(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        ServiceError::Store(error) => {
            warn!(error = %error, "decision store unavailable");
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        ServiceError::Batch(error @ (BatchError::MissingColumns(_) | BatchError::Csv(_))) => {
            bad_request(&error.to_string())
        }
        ServiceError::Batch(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
