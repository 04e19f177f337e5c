//! ProjectPulse trigger API binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pulse_common::config::AppConfig;
use pulse_common::db::{create_pool, run_migrations};
use pulse_common::redis_pool::create_redis_pool;

use pulse_api::routes::create_router;
use pulse_api::state::AppState;

/// Trigger payloads are single documents; anything larger is rejected.
const MAX_BODY_BYTES: usize = 256 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pulse_api=debug,pulse_engine=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting ProjectPulse trigger API...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database pool created");

    let redis = match &config.redis_url {
        Some(url) => Some(create_redis_pool(url).await?),
        None => {
            tracing::warn!("REDIS_URL not set, trigger deduplication disabled");
            None
        }
    };

    let state = AppState::from_config(&config, pool, redis)?;

    let cors = CorsLayer::new().allow_origin(AllowOrigin::exact(config.web_origin.parse()?));
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = config.api_bind_addr.parse()?;
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
