use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loanguard::lending::{decision_router, AlertNotifier, DecisionStore, LoanDecisionService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_decision_routes<S, N>(service: Arc<LoanDecisionService<S, N>>) -> axum::Router
where
    S: DecisionStore + 'static,
    N: AlertNotifier + 'static,
{
    decision_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryDecisionStore, LogNotifier};
    use axum::body::Body;
    use axum::http::Request;
    use loanguard::lending::ModelContext;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        }
    }

    fn router(state: AppState) -> axum::Router {
        let models = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../models");
        let model = ModelContext::load(models).expect("shipped artifacts load");
        let service = LoanDecisionService::new(
            Arc::new(model),
            Arc::new(InMemoryDecisionStore::default()),
            Arc::new(LogNotifier),
            0.82,
        );
        with_decision_routes(Arc::new(service)).layer(Extension(state))
    }

    async fn status_of(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let (status, payload) = status_of(router(state(false)), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["status"], "initializing");

        let (status, payload) = status_of(router(state(true)), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "ready");
    }

    #[tokio::test]
    async fn health_and_decision_routes_share_the_router() {
        let (status, payload) = status_of(router(state(true)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "ok");

        let (status, payload) = status_of(router(state(true)), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["total_applications"], 0);
    }

    #[tokio::test]
    async fn metrics_route_renders_prometheus_text() {
        let response = router(state(true))
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .expect("content type"),
            "text/plain; version=0.0.4"
        );
    }
}
