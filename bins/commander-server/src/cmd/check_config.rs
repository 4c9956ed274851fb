use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;

/// Загрузить и проверить конфиг без запуска сервера.
pub fn run(args: ServeArgs) -> Result<(), ServerError> {
    let config = ServerConfig::load(&args.config)?;
    let instances: Vec<&str> = config.data_instances.iter().map(|i| i.name.as_str()).collect();
    let dashboards: Vec<&str> = config.reports.dashboards.keys().map(String::as_str).collect();
    tracing::info!(
        config = %args.config,
        api_port = config.api_port,
        connect_timeout = ?config.connect_timeout(),
        ack_timeout = ?config.ack_timeout(),
        log_cap = config.log_cap,
        middleware = %config.middleware.url,
        directory = config.directory_url.as_deref().unwrap_or("-"),
        ?instances,
        salinfo_limit = ?config.salinfo.limit,
        ?dashboards,
        actuators = config.reports.m1m3_actuators.len(),
        "config is valid"
    );
    Ok(())
}
