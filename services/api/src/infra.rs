use directbnb::app::{Adapters, Services};
use directbnb::config::AppConfig;
use directbnb::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services backed by in-memory storage and the configured outbound clients.
pub(crate) fn build_services(config: &AppConfig) -> Result<Services, AppError> {
    Ok(Services::new(config, Adapters::in_memory(config)?))
}
