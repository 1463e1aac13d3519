use crate::cli::ServeArgs;
use crate::infra::{AppState, JsonPetitionStore, JsonProfileStore};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use petition_match::config::AppConfig;
use petition_match::error::AppError;
use petition_match::telemetry;
use petition_match::workflows::eligibility::{EligibilityService, OpenAiReasoningClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if config.reasoning.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; eligibility checks will return fallback results");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(EligibilityService::new(
        Arc::new(JsonProfileStore::new(config.storage.profiles_path())),
        Arc::new(JsonPetitionStore::new(config.storage.petitions_path())),
        Arc::new(OpenAiReasoningClient::new(config.reasoning.clone())),
    ));

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_dir = %config.storage.data_dir.display(),
        model = %config.reasoning.model,
        "petition matching service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
