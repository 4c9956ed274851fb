//! HTTP-слой gateway: маршруты команд, запросов к data instance'ам,
//! каталога интерфейсов компонентов и отчётов.

mod commands;
mod efd;
pub mod error;
mod reports;
mod salinfo;
pub mod service;

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

pub use commands::DEFAULT_IDENTITY;
pub use efd::MAX_TOP_N;
pub use error::{EFD_UNAVAILABLE, GatewayError};
pub use service::{CatalogService, CommandService, QueryService, ReportService};

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<dyn CommandService>,
    pub queries: Arc<dyn QueryService>,
    pub catalog: Arc<dyn CatalogService>,
    pub reports: Arc<dyn ReportService>,
    /// Глобальный лимит записей в ответе `/efd/logmessages`.
    pub log_cap: usize,
}

/// Маршруты gateway. Хвостовой `/` снимается до роутинга.
pub fn app(state: AppState) -> NormalizePath<Router> {
    let router = Router::new()
        .route("/cmd", post(commands::handle_cmd))
        .route("/tcs/aux", post(commands::handle_tcs_aux))
        .route("/tcs/main", post(commands::handle_tcs_main))
        .route("/efd/timeseries", post(efd::handle_timeseries))
        .route("/efd/top_timeseries", post(efd::handle_top_timeseries))
        .route("/efd/logmessages", post(efd::handle_log_messages))
        .route("/efd/efd_clients", get(efd::handle_efd_clients))
        .route("/heartbeat", get(efd::handle_heartbeat))
        .route("/salinfo/metadata", get(salinfo::handle_metadata))
        .route("/salinfo/topic-names", get(salinfo::handle_topic_names))
        .route("/salinfo/topic-data", get(salinfo::handle_topic_data))
        .route("/reports/m1m3-bump-tests", post(reports::handle_m1m3_bump_tests))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    NormalizePathLayer::trim_trailing_slash().layer(router)
}

/// HTTP API сервер gateway.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;
    tracing::info!(port, "commander api listening");

    axum::serve(listener, axum::ServiceExt::<Request>::into_make_service(app(state)))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests;
