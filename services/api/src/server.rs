use crate::cli::ServeArgs;
use crate::infra::{load_seed, AppState, LoggingNotificationPublisher, Seed};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_origination::config::AppConfig;
use loan_origination::error::AppError;
use loan_origination::telemetry;
use loan_origination::workflows::origination::{
    InMemoryApplicationRepository, LoanApplicationService,
};
use std::sync::atomic::Ordering;
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let seed = match config.origination.profile_seed.as_deref() {
        Some(path) => load_seed(path)?,
        None => {
            warn!("APP_PROFILE_SEED not set; no actors or profiles are registered");
            Seed::default()
        }
    };

    let repository = Arc::new(InMemoryApplicationRepository::with_actors(seed.actors));
    let application_service = Arc::new(LoanApplicationService::new(
        repository,
        Arc::new(seed.profiles),
        Arc::new(LoggingNotificationPublisher),
        config.origination.clone(),
    ));

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan origination service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
