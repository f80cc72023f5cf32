/*!
 * Configuration for the retention sweeper service.
 */

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub database_url: String,
    pub retention_hours: i64,
    pub sweep_interval: Duration,
    pub health_port: u16,
    pub metrics_port: u16,
}

impl SweeperConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let retention_hours = env::var("RETENTION_HOURS")
            .unwrap_or_else(|_| "72".to_string())
            .parse::<i64>()
            .context("RETENTION_HOURS must be a valid number")?;

        let sweep_interval_secs = env::var("RETENTION_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .context("RETENTION_SWEEP_INTERVAL_SECS must be a valid number")?;

        let health_port = env::var("SWEEPER_HEALTH_PORT")
            .unwrap_or_else(|_| "8082".to_string())
            .parse::<u16>()
            .context("SWEEPER_HEALTH_PORT must be a valid port number")?;

        let metrics_port = env::var("SWEEPER_METRICS_PORT")
            .unwrap_or_else(|_| "9092".to_string())
            .parse::<u16>()
            .context("SWEEPER_METRICS_PORT must be a valid port number")?;

        Ok(Self {
            database_url,
            retention_hours,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            health_port,
            metrics_port,
        })
    }
}
