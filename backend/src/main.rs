//! task-manager - HTTP Server Entry Point

use mockable::DefaultClock;
use std::sync::Arc;
use task_manager::{config::Config, serve, store::SqliteTaskStore, TaskService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Database path: {}", config.database_path.display());
    let store = SqliteTaskStore::open(&config.database_path).await?;
    let service = Arc::new(TaskService::new(Arc::new(store), Arc::new(DefaultClock)));

    serve(&config, service).await
}
