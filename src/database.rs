use sqlx::{postgres::PgPoolOptions, Executor, Pool, Postgres};
use tracing::info;

use crate::config::DatabaseConfig;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let session_settings = session_settings(config.statement_timeout_ms, config.lock_timeout_ms);

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout())
            .after_connect(move |conn, _meta| {
                let settings = session_settings.clone();
                Box::pin(async move {
                    for statement in &settings {
                        conn.execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }
}

// Timeouts bound every lock wait inside a booking transaction
fn session_settings(statement_timeout_ms: u64, lock_timeout_ms: u64) -> Vec<String> {
    let mut settings = Vec::with_capacity(2);
    if statement_timeout_ms > 0 {
        settings.push(format!("SET statement_timeout = {statement_timeout_ms}"));
    }
    if lock_timeout_ms > 0 {
        settings.push(format!("SET lock_timeout = {lock_timeout_ms}"));
    }
    settings
}
