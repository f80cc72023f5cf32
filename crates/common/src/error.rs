//! Error types shared by every HookRelay binary.

use thiserror::Error;

/// Errors surfaced by the durable-store and job-store/cache plumbing.
///
/// Crate-specific client-visible kinds (`SubscriptionNotFound`,
/// `InvalidPayload`, ...) live in the binary that raises them, per spec.md
/// §7 — this enum only covers the infrastructure layer common to all of
/// them.
#[derive(Debug, Error)]
pub enum Error {
    /// Durable-store errors (PostgreSQL via sqlx).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Redis (job store / subscription cache) errors.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization errors.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic errors from crates without a dedicated variant.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("missing DATABASE_URL".to_string());
        assert_eq!(err.to_string(), "configuration error: missing DATABASE_URL");
    }

    #[test]
    fn test_error_conversion() {
        let sql_err = sqlx::Error::RowNotFound;
        let our_err: Error = sql_err.into();
        assert!(matches!(our_err, Error::Database(_)));
    }
}
