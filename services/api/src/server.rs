use crate::cli::ServeArgs;
use crate::infra::{utc_today, AppState, LendingState};
use crate::routes::lending_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lending_lens::config::AppConfig;
use lending_lens::error::AppError;
use lending_lens::telemetry;
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

    let lending = LendingState::from_config(&config, utc_today())?;
    if !lending.authority.is_enabled() {
        warn!("LENDING_COMMIT_KEY unset; threshold commits are disabled");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        lending,
    };

    let app = lending_routes()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_source = config.data.source.label(),
        "lending analytics service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
