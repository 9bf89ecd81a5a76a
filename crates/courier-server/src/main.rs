mod api;
mod middleware;
mod refresh;
mod scheduler;

use std::sync::Arc;

use courier_core::{QueryEngine, SnapshotStore, SystemClock};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    refresh::SnapshotRefresher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(courier_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = courier_db::PoolConfig::from_app_config(&config);
    let pool = courier_db::connect_pool(config.require_database_url()?, pool_config).await?;
    let applied = courier_db::run_migrations(&pool).await?;
    tracing::info!(applied, env = %config.env, "database ready");

    let snapshots = Arc::new(SnapshotStore::new());
    let refresher = SnapshotRefresher::new(
        pool.clone(),
        Arc::clone(&snapshots),
        config.grid_cell_size_degrees,
    );
    // Queries answer 503 until a snapshot exists; the cron job retries.
    if let Err(e) = refresher.refresh("startup").await {
        tracing::error!(error = %e, "initial snapshot load failed");
    }

    tokio::spawn(refresh::listen_for_changes(refresher.clone()));
    let _scheduler = scheduler::build_scheduler(refresher, &config.snapshot_refresh_cron).await?;

    let engine = QueryEngine::new(Arc::new(config.query_settings()), Arc::new(SystemClock));
    let app = build_app(AppState {
        pool,
        snapshots,
        engine,
        config: Arc::clone(&config),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "courier-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
