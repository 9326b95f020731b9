use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_application_routes;
use apply_intake::config::AppConfig;
use apply_intake::error::AppError;
use apply_intake::intake::{lazy_pool, IntakeService, PgApplicationRepository};
use apply_intake::middleware::RateLimiter;
use apply_intake::telemetry;
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
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
    if let Some(public_dir) = args.public_dir.take() {
        config.assets.public_dir = public_dir;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pool = lazy_pool(&config.database);
    let repository = Arc::new(PgApplicationRepository::new(pool));
    let intake_service = Arc::new(IntakeService::new(repository));
    let limiter = RateLimiter::new(config.rate_limit);

    let app = with_application_routes(
        intake_service,
        limiter,
        app_state,
        &config.assets.public_dir,
    )
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        public_dir = %config.assets.public_dir.display(),
        max_connections = config.database.max_connections,
        "application intake listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub(crate) async fn migrate() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let repository = PgApplicationRepository::new(lazy_pool(&config.database));
    repository.ensure_schema().await?;
    repository.pool().close().await;

    info!(?config.environment, "applications table ready");
    Ok(())
}
