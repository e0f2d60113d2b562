use anyhow::Context;
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinema_booking::{
    cache::SeatMapCache,
    config::{AppConfig, Config, LogFormat},
    database::Database,
    redis_client::RedisClient,
    services::analytics::{AnalyticsDispatcher, RedisStreamSink},
    shutdown::shutdown_signal,
    AppState,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing(app: &AppConfig) {
    let filter = EnvFilter::try_new(&app.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match app.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config.app);

    info!(environment = %config.app.environment, "Starting Cinema Booking API");

    // Connect to the database
    let db = Database::new(&config.database)
        .await
        .context("failed to connect to database")?;
    info!("Database connected");

    db.run_migrations()
        .await
        .context("failed to run migrations")?;

    // Redis is connected lazily, on first use
    let redis = config
        .redis
        .url
        .as_deref()
        .map(|url| RedisClient::new(url, Duration::from_millis(config.redis.timeout_ms)))
        .transpose()
        .context("invalid REDIS_URL")?;

    let (analytics, analytics_worker) = match (&redis, config.features.enable_analytics) {
        (Some(redis), true) => {
            let sink = Arc::new(RedisStreamSink::new(
                redis.clone(),
                config.analytics.stream.clone(),
                config.analytics.stream_max_len,
            ));
            let (dispatcher, worker) = AnalyticsDispatcher::from_config(sink, &config.analytics);
            info!(stream = %config.analytics.stream, "Booking analytics enabled");
            (dispatcher, Some(worker))
        }
        _ => {
            info!("Booking analytics disabled");
            (AnalyticsDispatcher::disabled(), None)
        }
    };

    let seat_maps = match (&redis, config.features.enable_seatmap_cache) {
        (Some(redis), true) => SeatMapCache::new(redis.clone(), config.redis.seatmap_ttl_secs),
        _ => SeatMapCache::disabled(),
    };

    let state = AppState::new(config.clone(), db, analytics, seat_maps);
    let app = cinema_booking::router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Dropping the last state handle closes the analytics queue
    drop(state);
    if let Some(worker) = analytics_worker {
        if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
            warn!("analytics worker did not drain in time");
        }
    }

    info!("Server stopped");
    Ok(())
}
