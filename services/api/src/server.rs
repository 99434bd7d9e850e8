use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredNotifier, DecisionLog};
use crate::routes::with_decision_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loanguard::config::AppConfig;
use loanguard::error::AppError;
use loanguard::lending::{LoanDecisionService, ModelContext};
use loanguard::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(dir) = args.model_dir.take() {
        config.model.artifacts_dir = dir;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let model = Arc::new(ModelContext::load(&config.model.artifacts_dir)?);
    let store = Arc::new(DecisionLog::from_path(
        config.storage.decision_log.as_deref(),
    )?);
    let notifier = Arc::new(ConfiguredNotifier::from_webhook(
        config.monitoring.alert_webhook.clone(),
        config.monitoring.alert_timeout,
    )?);
    let decision_service = Arc::new(LoanDecisionService::new(
        model,
        store,
        notifier,
        config.monitoring.baseline_accuracy,
    ));

    let app = with_decision_routes(decision_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        baseline = config.monitoring.baseline_accuracy,
        "loan decision service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
