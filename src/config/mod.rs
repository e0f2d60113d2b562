use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Top-level configuration: one container for every settings group
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub analytics: AnalyticsConfig,
    pub features: FeatureFlags,
}

// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
    pub cors_origin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

// PostgreSQL settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
    /// Per-statement timeout in milliseconds, 0 disables it.
    pub statement_timeout_ms: u64,
    /// Upper bound on waiting for a row lock in milliseconds, 0 disables it.
    pub lock_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

// Redis settings (seat map cache + analytics stream)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
    pub seatmap_ttl_secs: u64,
}

// JWT verification settings
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

// Analytics dispatch settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    pub stream: String,
    pub stream_max_len: usize,
    pub queue_capacity: usize,
    pub failure_threshold: u32,
    pub breaker_timeout_secs: u64,
}

// Feature flags
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_analytics: bool,
    pub enable_seatmap_cache: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let features = FeatureFlags {
            enable_analytics: vars.parse_or("ENABLE_ANALYTICS", true)?,
            enable_seatmap_cache: vars.parse_or("ENABLE_SEATMAP_CACHE", true)?,
        };

        let redis_url = vars.get("REDIS_URL");
        if redis_url.is_none() && (features.enable_analytics || features.enable_seatmap_cache) {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        Ok(Config {
            app: AppConfig {
                host: vars.get_or("HOST", "0.0.0.0"),
                port: vars.parse_or("PORT", 8000)?,
                environment: vars.get_or("ENVIRONMENT", "development"),
                rust_log: vars.get_or("RUST_LOG", "cinema_booking=debug,tower_http=debug"),
                log_format: vars.parse_or("LOG_FORMAT", LogFormat::Pretty)?,
                cors_origin: vars.get_or("CORS_ORIGIN", "http://localhost:5173"),
            },
            database: DatabaseConfig {
                url: vars.require("DATABASE_URL")?,
                pool_size: vars.parse_or("DB_POOL_SIZE", 20)?,
                acquire_timeout_secs: vars.parse_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?,
                statement_timeout_ms: vars.parse_or("DB_STATEMENT_TIMEOUT_MS", 5_000)?,
                lock_timeout_ms: vars.parse_or("DB_LOCK_TIMEOUT_MS", 3_000)?,
            },
            redis: RedisConfig {
                url: redis_url,
                timeout_ms: vars.parse_or("REDIS_TIMEOUT_MS", 250)?,
                seatmap_ttl_secs: vars.parse_or("SEATMAP_CACHE_TTL_SECS", 30)?,
            },
            jwt: JwtConfig {
                secret: vars.require("JWT_SECRET")?,
            },
            analytics: AnalyticsConfig {
                stream: vars.get_or("ANALYTICS_STREAM", "booking_stats"),
                stream_max_len: vars.parse_or("ANALYTICS_STREAM_MAX_LEN", 100_000)?,
                queue_capacity: vars.parse_or("ANALYTICS_QUEUE_CAPACITY", 1024)?,
                failure_threshold: vars.parse_or("ANALYTICS_FAILURE_THRESHOLD", 5)?,
                breaker_timeout_secs: vars.parse_or("ANALYTICS_BREAKER_TIMEOUT_SECS", 60)?,
            },
            features,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
