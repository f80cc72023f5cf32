/*!
 * Configuration for the delivery worker service.
 */

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub database_url: String,

    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,

    pub queue_name: String,

    pub worker_count: usize,
    pub http_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_schedule_secs: Vec<u64>,

    pub scheduler_poll_interval_ms: u64,
    pub visibility_timeout_secs: u64,
    pub sc_cache_ttl_secs: u64,

    pub health_port: u16,
    pub metrics_port: u16,
}

impl DeliveryConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
        let redis_port = env::var("REDIS_PORT")
            .unwrap_or_else(|_| "6379".to_string())
            .parse::<u16>()
            .context("REDIS_PORT must be a valid port number")?;
        let redis_password = env::var("REDIS_PASSWORD").ok();

        let queue_name = env::var("QUEUE_NAME").unwrap_or_else(|_| "deliveries".to_string());

        let worker_count = env::var("WORKER_COUNT")
            .unwrap_or_else(|_| "50".to_string())
            .parse::<usize>()
            .context("WORKER_COUNT must be a valid number")?;

        let http_timeout = Duration::from_secs(
            env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<u64>()
                .context("HTTP_TIMEOUT_SECS must be a valid number")?,
        );

        let max_attempts = env::var("MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("MAX_ATTEMPTS must be a valid number")?;

        let backoff_schedule_secs = env::var("BACKOFF_SCHEDULE_SECS")
            .unwrap_or_else(|_| "10,30,60,300,900".to_string())
            .split(',')
            .map(|part| part.trim().parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("BACKOFF_SCHEDULE_SECS must be a comma-separated list of numbers")?;

        let scheduler_poll_interval_ms = env::var("SCHEDULER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("SCHEDULER_POLL_INTERVAL_MS must be a valid number")?;

        let visibility_timeout_secs = env::var("VISIBILITY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("VISIBILITY_TIMEOUT_SECS must be a valid number")?;

        let sc_cache_ttl_secs = env::var("SC_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .context("SC_CACHE_TTL_SECS must be a valid number")?;

        let health_port = env::var("DELIVERY_HEALTH_PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse::<u16>()
            .context("DELIVERY_HEALTH_PORT must be a valid port number")?;

        let metrics_port = env::var("DELIVERY_METRICS_PORT")
            .unwrap_or_else(|_| "9091".to_string())
            .parse::<u16>()
            .context("DELIVERY_METRICS_PORT must be a valid port number")?;

        Ok(Self {
            database_url,
            redis_host,
            redis_port,
            redis_password,
            queue_name,
            worker_count,
            http_timeout,
            max_attempts,
            backoff_schedule_secs,
            scheduler_poll_interval_ms,
            visibility_timeout_secs,
            sc_cache_ttl_secs,
            health_port,
            metrics_port,
        })
    }

    pub fn redis_url(&self) -> String {
        if let Some(password) = &self.redis_password {
            format!("redis://:{}@{}:{}", password, self.redis_host, self.redis_port)
        } else {
            format!("redis://{}:{}", self.redis_host, self.redis_port)
        }
    }

    /// Delay before `attempt + 1`, indexed by `attempt - 1`. Falls back to
    /// the schedule's last entry if `attempt` exceeds its length (keeps
    /// `MAX_ATTEMPTS` as the source of truth for when retries stop).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let idx = (attempt.saturating_sub(1)) as usize;
        let secs = self
            .backoff_schedule_secs
            .get(idx)
            .or_else(|| self.backoff_schedule_secs.last())
            .copied()
            .unwrap_or(0);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DeliveryConfig {
        DeliveryConfig {
            database_url: "postgresql://localhost/test".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: None,
            queue_name: "deliveries".to_string(),
            worker_count: 50,
            http_timeout: Duration::from_secs(5),
            max_attempts: 5,
            backoff_schedule_secs: vec![10, 30, 60, 300, 900],
            scheduler_poll_interval_ms: 500,
            visibility_timeout_secs: 30,
            sc_cache_ttl_secs: 300,
            health_port: 8081,
            metrics_port: 9091,
        }
    }

    #[test]
    fn test_redis_url_without_password() {
        assert_eq!(sample_config().redis_url(), "redis://localhost:6379");
    }

    #[test]
    fn backoff_for_attempt_indexes_from_one() {
        let config = sample_config();
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(10));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(30));
        assert_eq!(config.backoff_for_attempt(5), Duration::from_secs(900));
    }

    #[test]
    fn backoff_for_attempt_past_schedule_uses_last_entry() {
        let config = sample_config();
        assert_eq!(config.backoff_for_attempt(99), Duration::from_secs(900));
    }
}
