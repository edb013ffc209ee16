use std::future;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use ircbridge::{BridgeServer, Config, Result, TcpConnector};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::parse_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bridge failed");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// ============================================================================
// Run
// ============================================================================

async fn run(config: Config) -> Result<()> {
    let server = BridgeServer::bind(
        config.listen_addr(),
        Arc::new(TcpConnector::new()),
        config.backend_settings(),
    )
    .await?;

    server.run_until(shutdown_signal()).await;

    info!("ircbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        future::pending::<()>().await;
    }
}
