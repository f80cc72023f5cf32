/*!
 * Configuration for the ingest service.
 */

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: String,

    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,

    pub queue_name: String,

    pub sc_cache_ttl_secs: u64,
    pub max_payload_bytes: usize,

    pub port: u16,
    pub health_port: u16,
    pub metrics_port: u16,
}

impl IngestConfig {
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

        let sc_cache_ttl_secs = env::var("SC_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .context("SC_CACHE_TTL_SECS must be a valid number")?;

        let max_payload_bytes = env::var("MAX_PAYLOAD_BYTES")
            .unwrap_or_else(|_| "262144".to_string())
            .parse::<usize>()
            .context("MAX_PAYLOAD_BYTES must be a valid number")?;

        let port = env::var("INGEST_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("INGEST_PORT must be a valid port number")?;

        let health_port = env::var("INGEST_HEALTH_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("INGEST_HEALTH_PORT must be a valid port number")?;

        let metrics_port = env::var("INGEST_METRICS_PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse::<u16>()
            .context("INGEST_METRICS_PORT must be a valid port number")?;

        Ok(Self {
            database_url,
            redis_host,
            redis_port,
            redis_password,
            queue_name,
            sc_cache_ttl_secs,
            max_payload_bytes,
            port,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url_without_password() {
        let config = IngestConfig {
            database_url: "postgresql://localhost/test".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: None,
            queue_name: "deliveries".to_string(),
            sc_cache_ttl_secs: 300,
            max_payload_bytes: 262144,
            port: 8000,
            health_port: 8080,
            metrics_port: 9090,
        };

        assert_eq!(config.redis_url(), "redis://localhost:6379");
    }

    #[test]
    fn test_redis_url_with_password() {
        let config = IngestConfig {
            database_url: "postgresql://localhost/test".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: Some("secret".to_string()),
            queue_name: "deliveries".to_string(),
            sc_cache_ttl_secs: 300,
            max_payload_bytes: 262144,
            port: 8000,
            health_port: 8080,
            metrics_port: 9090,
        };

        assert_eq!(config.redis_url(), "redis://:secret@localhost:6379");
    }
}
