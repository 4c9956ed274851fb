mod cmd;
mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::{Cli, Commands};

/// Фильтр логов из `COMMANDER_LOG`, по умолчанию `info`.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("COMMANDER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let result = match Cli::parse().command {
        Commands::Serve(args) => cmd::serve::run(args).await,
        Commands::CheckConfig(args) => cmd::check_config::run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "commander-server failed");
            ExitCode::FAILURE
        }
    }
}
