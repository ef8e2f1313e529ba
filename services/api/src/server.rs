use crate::cli::ServeArgs;
use crate::infra::{build_services, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use directbnb::config::AppConfig;
use directbnb::error::AppError;
use directbnb::telemetry;
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.stripe.secret_key.is_none() {
        warn!("STRIPE_SECRET_KEY is not set; checkout sessions will fail");
    }
    if config.stripe.webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET is not set; webhooks will be refused");
    }

    let services = build_services(&config)?;
    let app = with_operational_routes(services.router())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, site_url = %config.site.site_url, "directbnb api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
