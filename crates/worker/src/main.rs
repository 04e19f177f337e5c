use std::sync::Arc;

use pulse_common::config::AppConfig;
use pulse_common::db;
use pulse_engine::store::postgres::PgStore;
use pulse_engine::sweeper::RetentionSweeper;
use pulse_worker::scheduler::SweepScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_worker=info,pulse_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("ProjectPulse worker starting...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let sweeper = RetentionSweeper::new(
        Arc::new(PgStore::new(pool)),
        config.notification_retention_days,
        config.sweep_batch_limit,
    );
    let scheduler = SweepScheduler::new(Arc::new(sweeper), config.sweep_interval_secs);

    tracing::info!(
        retention_days = config.notification_retention_days,
        batch_limit = config.sweep_batch_limit,
        "Starting retention sweeper"
    );

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("ProjectPulse worker stopped.");
    Ok(())
}
