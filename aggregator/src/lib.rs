pub mod config;
pub mod errors;
pub mod executor;
pub mod fetcher;
pub mod merger;
pub mod metrics_defs;
pub mod query;
pub mod render;
pub mod service;
pub mod strategy;

#[cfg(test)]
mod testutils;

use errors::{AggregatorError, Result};
use service::NumbersService;
use shared::admin_service::{AdminService, Readiness};
use shared::http::{run_http_service, serve};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Serves the numbers endpoint (and the admin endpoint when configured) until
/// SIGINT or SIGTERM.
pub async fn run(config: config::Config) -> Result<()> {
    run_until(config, shutdown_signal()).await
}

/// Like [`run`], stopping when `shutdown` resolves instead of on a signal.
///
/// Shutdown runs in order: readiness turns false, the public listener stops
/// accepting and drains its in-flight requests for up to the shutdown grace,
/// and only then the admin listener stops. `/ready` keeps answering 503 for
/// the whole drain.
pub async fn run_until<F>(config: config::Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let readiness = Readiness::new();
    let grace = config.timeouts.shutdown_grace();
    let (stop_tx, stop_rx) = watch::channel(false);
    let (admin_stop_tx, admin_stop_rx) = watch::channel(false);

    let listener =
        TcpListener::bind(format!("{}:{}", config.listener.host, config.listener.port)).await?;
    let numbers_task = async {
        let result = serve(listener, NumbersService::new(&config), stopped(stop_rx), grace).await;
        let _ = admin_stop_tx.send(true);
        result
    };

    let admin_task = async {
        match &config.admin_listener {
            Some(admin) => {
                run_http_service(
                    &admin.host,
                    admin.port,
                    AdminService::<AggregatorError>::new(readiness.clone()),
                    stopped(admin_stop_rx),
                    grace,
                )
                .await
            }
            None => Ok(()),
        }
    };

    let shutdown_task = async {
        shutdown.await;
        readiness.set_ready(false);
        let _ = stop_tx.send(true);
        Ok::<(), AggregatorError>(())
    };

    readiness.set_ready(true);
    tracing::info!(strategy = config.strategy.as_str(), "numbers service started");

    tokio::try_join!(numbers_task, admin_task, shutdown_task)?;
    tracing::info!("numbers service stopped");
    Ok(())
}

async fn stopped(mut stop_rx: watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
