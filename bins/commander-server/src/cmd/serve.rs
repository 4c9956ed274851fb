use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use client_registry::ClientRegistry;
use command_dispatch::CommandDispatcher;
use commander_api_server::AppState;
use component_catalog::ComponentCatalog;
use efd_reports::Reports;
use query_fanout::QueryFanout;
use upstream_http::{HttpChannelConnector, HttpSchemaConnector, HttpStoreConnector};

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;

/// Сколько ждать завершения API сервера после отмены.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("commander-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(
        config = %args.config,
        instances = config.data_instances.len(),
        middleware = %config.middleware.url,
        "loaded config"
    );

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Registries ---
    let http = reqwest::Client::builder().build()?;
    let stores = Arc::new(ClientRegistry::new(
        HttpStoreConnector::new(http.clone(), config.instance_urls(), config.directory_url.clone()),
        config.connect_timeout(),
    ));
    let channels = Arc::new(ClientRegistry::new(
        HttpChannelConnector::new(http.clone(), config.middleware.url.clone()),
        config.connect_timeout(),
    ));
    let schemas = Arc::new(ClientRegistry::new(
        HttpSchemaConnector::new(http, config.middleware.url.clone()),
        config.connect_timeout(),
    ));

    let dispatcher = Arc::new(CommandDispatcher::new(channels.clone(), config.ack_timeout()));
    let fanout = Arc::new(QueryFanout::new(stores.clone()));
    let catalog = Arc::new(ComponentCatalog::new(schemas.clone(), config.salinfo.limit));
    let reports = Arc::new(Reports::new(
        stores.clone(),
        config.reports.actuator_table(),
        config.reports.dashboards.clone(),
    ));

    // --- API server ---
    let state = AppState {
        commands: dispatcher,
        queries: fanout,
        catalog,
        reports,
        log_cap: config.log_cap,
    };
    let api_port = config.api_port;
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(async move {
        commander_api_server::run(api_port, state, api_token).await
    });

    tracing::info!(port = api_port, "server ready");

    // --- Ожидание Ctrl+C или падения API ---
    let served = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
            token.cancel();
            match tokio::time::timeout(DRAIN_TIMEOUT, &mut api_handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("api server did not drain in time, aborting");
                    api_handle.abort();
                    Ok(Ok(()))
                }
            }
        }
        joined = &mut api_handle => joined,
    };

    // Закрыть все закэшированные клиенты
    channels.close_all().await;
    stores.close_all().await;
    schemas.close_all().await;

    tracing::info!("shutdown complete");
    match served {
        Ok(result) => result.map_err(ServerError::Api),
        Err(e) => Err(ServerError::Api(format!("api task: {e}"))),
    }
}
