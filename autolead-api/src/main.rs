use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use autolead_api::{app, dashboard, state::{AppState, AuthConfig}};
use autolead_store::{
    app_config::Config, DbClient, RedisClient, RedisSessionStore, StoreAnalyticsRepository,
    StoreCarRepository, StoreClientRepository, StoreInteractionRepository, StoreInventoryRepository,
    StoreSearchLogRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autolead_api=debug,autolead_store=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting AutoLead API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url).await?;
    db.ping().await?;
    db.migrate().await?;
    let pool = db.pool.clone();

    // Redis: sessions and rate limiting
    let redis = RedisClient::new(&config.redis.url).await?;
    if let Err(e) = redis.ping().await {
        // Sessions and the rate limiter both fail open
        tracing::warn!("Redis unreachable at startup: {}", e);
    }
    let sessions = RedisSessionStore::new(redis.clone(), config.business_rules.session_ttl_seconds);

    let analytics_repo = Arc::new(StoreAnalyticsRepository::new(pool.clone()));

    // Dashboard feed
    let dashboard_tx = dashboard::channel();
    dashboard::spawn_refresh_task(
        analytics_repo.clone(),
        dashboard_tx.clone(),
        Duration::from_secs(config.business_rules.dashboard_refresh_seconds),
    );

    let app_state = AppState {
        client_repo: Arc::new(StoreClientRepository::new(pool.clone())),
        interaction_repo: Arc::new(StoreInteractionRepository::new(pool.clone())),
        car_repo: Arc::new(StoreCarRepository::new(pool.clone())),
        search_log_repo: Arc::new(StoreSearchLogRepository::new(pool.clone())),
        inventory_repo: Arc::new(StoreInventoryRepository::new(pool)),
        analytics_repo,
        sessions: Arc::new(sessions),
        rate_limiter: Arc::new(redis),
        dashboard_tx,
        business_rules: config.business_rules.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            admin_api_key: config.auth.admin_api_key.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
