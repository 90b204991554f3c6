use std::{future::Future, io};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use recommendation_service::{
    api::{create_router, AppState},
    config::Config,
    services::RecommendationRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recommendation_service=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    // Startup fails hard when the store is unreachable
    let repository = RecommendationRepository::connect(&config)
        .await
        .context("Failed to initialize the recommendation store")?;

    let app = create_router(AppState::new(repository.clone()), &config.static_dir);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server running on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    repository.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = signal_or_pending("Ctrl-C", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = signal_or_pending("SIGTERM", async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        signal.recv().await;
        Ok::<(), io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Completes when `signal` fires
///
/// A listener that cannot be registered never completes, so the server keeps
/// running on the remaining signals.
async fn signal_or_pending<F>(name: &str, signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for {}", name);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_failed_signal_registration_never_completes() {
        let failing = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "unsupported")) };
        let waited =
            tokio::time::timeout(Duration::from_millis(20), signal_or_pending("test", failing))
                .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_delivered_signal_completes() {
        let delivered = async { Ok::<(), io::Error>(()) };
        let waited =
            tokio::time::timeout(Duration::from_millis(20), signal_or_pending("test", delivered))
                .await;
        assert!(waited.is_ok());
    }
}
