use redis::AsyncCommands;
use std::future::Future;
use tracing::{debug, warn};

use crate::redis_client::RedisClient;

/// Result of a seat map cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatMapLookup {
    Hit(String),
    /// Nothing cached for the current generation; a fresh rendering goes
    /// back under `generation`.
    Miss { generation: i64 },
    /// Cache disabled or Redis failing.
    Unavailable,
}

/// Redis cache for rendered seat maps, keyed by showtime.
///
/// Entries live under a per-showtime generation. Invalidation bumps the
/// generation instead of deleting, so a reader that loaded the map before a
/// booking committed can only write to a generation nobody reads anymore.
///
/// Purely an accelerator: every failure (Redis down, timeout, bad entry) is
/// logged and treated as a miss, and nothing in the booking flow reads it.
#[derive(Clone)]
pub struct SeatMapCache {
    redis: Option<RedisClient>,
    ttl_secs: u64,
}

impl SeatMapCache {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self {
            redis: Some(redis),
            ttl_secs,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl_secs: 0,
        }
    }

    fn generation_key(showtime_id: i64) -> String {
        format!("seatmap:{showtime_id}:gen")
    }

    fn key(showtime_id: i64, generation: i64) -> String {
        format!("seatmap:{showtime_id}:v{generation}")
    }

    // Runs a Redis call under the client timeout, folding every failure into None
    async fn run<T, F, Fut>(&self, op: &'static str, call: F) -> Option<T>
    where
        F: FnOnce(RedisClient) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let redis = self.redis.clone()?;
        let timeout = redis.timeout();
        match tokio::time::timeout(timeout, call(redis)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(op, error = %err, "seat map cache call failed");
                None
            }
            Err(_) => {
                warn!(op, ?timeout, "seat map cache call timed out");
                None
            }
        }
    }

    pub async fn get(&self, showtime_id: i64) -> SeatMapLookup {
        let generation_key = Self::generation_key(showtime_id);
        let read = self
            .run("get", |redis| async move {
                let mut conn = redis.connection().await?;
                let generation: Option<i64> = conn.get(&generation_key).await?;
                let generation = generation.unwrap_or(0);
                let body: Option<String> = conn.get(Self::key(showtime_id, generation)).await?;
                Ok((generation, body))
            })
            .await;

        match read {
            Some((_, Some(body))) => SeatMapLookup::Hit(body),
            Some((generation, None)) => SeatMapLookup::Miss { generation },
            None => SeatMapLookup::Unavailable,
        }
    }

    /// Stores a rendering read under `generation`, as returned by a miss.
    pub async fn put(&self, showtime_id: i64, generation: i64, json: &str) {
        if self.ttl_secs == 0 {
            return;
        }
        let key = Self::key(showtime_id, generation);
        let value = json.to_string();
        let ttl = self.ttl_secs;
        self.run("put", |redis| async move {
            let mut conn = redis.connection().await?;
            conn.set_ex::<_, _, ()>(key, value, ttl).await
        })
        .await;
    }

    pub async fn invalidate(&self, showtime_id: i64) {
        let generation_key = Self::generation_key(showtime_id);
        let generation = self
            .run("invalidate", |redis| async move {
                let mut conn = redis.connection().await?;
                conn.incr::<_, _, i64>(generation_key, 1).await
            })
            .await;
        if let Some(generation) = generation {
            debug!(showtime_id, generation, "invalidated seat map cache");
        }
    }

    /// Invalidates without making the caller wait on Redis.
    pub fn invalidate_in_background(&self, showtime_id: i64) {
        if self.redis.is_none() {
            return;
        }
        let cache = self.clone();
        tokio::spawn(async move { cache.invalidate(showtime_id).await });
    }
}
