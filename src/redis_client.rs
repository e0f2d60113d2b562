use redis::{aio::ConnectionManager, Client, RedisResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Lazily connected Redis handle.
///
/// The first caller establishes a `ConnectionManager`, which then reconnects
/// on its own. Startup never blocks on Redis being reachable.
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: Arc<OnceCell<ConnectionManager>>,
    timeout: Duration,
}

impl RedisClient {
    pub fn new(redis_url: &str, timeout: Duration) -> RedisResult<Self> {
        let client = Client::open(redis_url)?;
        Ok(RedisClient {
            client,
            manager: Arc::new(OnceCell::new()),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn connection(&self) -> RedisResult<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(manager.clone())
    }
}
