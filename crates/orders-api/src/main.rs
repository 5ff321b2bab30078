use anyhow::Context;
use orders_api::config::Config;
use orders_api::lifecycle::{setup_tracing, App};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        addr = %config.listen_addr,
        backend = ?config.backend,
        page_size = config.page_size.get(),
        "Starting orders service"
    );

    let app = App::new(config).context("failed to create application")?;
    app.start(shutdown_signal())
        .await
        .context("orders service failed")?;

    info!("Orders service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
