use std::time::Duration;

use quadcalc_queue::{JobExecutor, WorkerPool, WorkerPoolConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for in-flight jobs during shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quadcalc_worker=debug,quadcalc_queue=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = quadcalc_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    quadcalc_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- LLM verification (optional) ---
    let verifier = quadcalc_llm::LlmClient::from_env().expect("Failed to build LLM client");

    // --- Worker pool ---
    let config = WorkerPoolConfig::from_env();
    let executor = JobExecutor::new(pool.clone(), verifier);
    let worker_pool = WorkerPool::new(pool, executor, config);

    let cancel = CancellationToken::new();
    let handles = worker_pool.start(cancel.clone());
    tracing::info!("Worker pool started");

    // --- Shutdown ---
    shutdown_signal().await;
    cancel.cancel();

    for handle in handles {
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            tracing::warn!("Worker did not drain within timeout");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
