use tokio::signal;

use crate::core::redis::RedisHandle;

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub(crate) async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!(signal = "interrupt", "Stopping portal"),
        _ = terminate => tracing::info!(signal = "terminate", "Stopping portal"),
    }
}

/// Releases shared connections once the server stopped accepting requests.
pub(crate) async fn drain(db: &sqlx::PgPool, redis: &RedisHandle) {
    redis.disconnect().await;
    db.close().await;
    tracing::info!("Database pool and Redis connection closed");
}
