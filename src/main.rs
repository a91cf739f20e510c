use chrono::Utc;
use dotenvy::dotenv;
use roof_offer::{
    config::{database, settings},
    core::tasks,
    errors::Result,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    let batch = app_config.batch_options()?;
    info!(
        chunk_size = batch.chunk_size,
        threshold = batch.threshold,
        sweep_interval_secs = app_config.sweep.interval_secs,
        "Configuration loaded"
    );

    // 4. Connect and make sure the schema exists
    let url = database::get_database_url(app_config.database.url.as_deref())?;
    database::ensure_database_dir(&url)?;
    let db = database::create_connection(&url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Run the overdue task sweep in the background on a shared connection
    let db = Arc::new(db);
    let sweep_db = Arc::clone(&db);
    let interval = Duration::from_secs(app_config.sweep.interval_secs.max(1));
    let sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = tasks::sweep_overdue_tasks(&sweep_db, Utc::now()).await {
                error!("Overdue task sweep failed: {}", e);
            }
        }
    });

    // 6. Wait for shutdown
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    sweep.abort();
    // A cancelled task reports a JoinError; only its Arc matters here
    let _ = sweep.await;
    if let Ok(db) = Arc::try_unwrap(db) {
        db.close().await?;
    }

    Ok(())
}
