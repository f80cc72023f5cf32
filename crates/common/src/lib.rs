//! # HookRelay Common
//!
//! Shared infrastructure used by every HookRelay service:
//! - PostgreSQL connection pooling (sqlx)
//! - Redis connection wrapper
//! - Common error type
//! - Structured logging setup

pub mod db;
pub mod error;
pub mod logging;
pub mod redis_client;

pub use db::create_pool;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use redis_client::RedisClient;
