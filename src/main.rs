use anyhow::Context;
use modalgate::classify::Classifier;
use modalgate::jobs::{JobManager, SubmitLimits};
use modalgate::orchestrator::Orchestrator;
use modalgate::registry::HandlerRegistry;
use modalgate::{api, config, logging};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();

    let settings = config::get_config();
    tokio::fs::create_dir_all(&settings.upload_dir)
        .await
        .with_context(|| format!("failed to create upload directory {}", settings.upload_dir))?;

    let registry = HandlerRegistry::from_config().context("failed to build handler registry")?;
    let orchestrator = Orchestrator::new(Classifier::from_config(), registry);
    let manager = Arc::new(JobManager::new(orchestrator, SubmitLimits::from_config()));
    manager.spawn_sweeper(
        Duration::from_secs(settings.job_sweep_interval_secs),
        Duration::from_secs(settings.job_retention_hours * 3600),
    );

    let app = api::create_router(manager);
    let (listener, port) = bind_listener().await.context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;
    Ok(())
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8200..=8299;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrInUse,
        "No available port in the 8200-8299 range",
    ))
}
