//! Subscription cache (the "SC" component): cache-aside reads over the
//! subscription durable store, backed by Redis.
//!
//! Grounded on `hookrelay-common::RedisClient`'s `get`/`set_ex` wrapper —
//! this layer adds the cache-aside fallback and swallows cache-specific
//! errors rather than letting them cross its public API: a corrupt or
//! unreachable cache degrades to a DS read, never an error to the caller.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use hookrelay_domain::{repository, Subscription};

const DEFAULT_TTL_SECS: u64 = 300;

pub struct SubscriptionCache {
    conn: ConnectionManager,
    pool: PgPool,
    ttl_secs: u64,
}

impl SubscriptionCache {
    pub fn new(conn: ConnectionManager, pool: PgPool, ttl_secs: u64) -> Self {
        Self {
            conn,
            pool,
            ttl_secs,
        }
    }

    pub fn with_default_ttl(conn: ConnectionManager, pool: PgPool) -> Self {
        Self::new(conn, pool, DEFAULT_TTL_SECS)
    }

    fn cache_key(id: Uuid) -> String {
        format!("subscription:{id}")
    }

    /// Write a subscription into the cache. Called by repository writes
    /// (insert/update) so the cache stays warm without waiting for a miss.
    pub async fn cache(&mut self, subscription: &Subscription) {
        let key = Self::cache_key(subscription.id);
        let json = match serde_json::to_string(subscription) {
            Ok(json) => json,
            Err(err) => {
                warn!(%err, subscription_id = %subscription.id, "failed to serialize subscription for cache");
                return;
            }
        };

        if let Err(err) = self
            .conn
            .set_ex::<_, _, ()>(&key, json, self.ttl_secs)
            .await
        {
            warn!(%err, subscription_id = %subscription.id, "failed to write subscription cache entry");
        }
    }

    /// Drop a subscription from the cache. Called by repository deletes.
    pub async fn invalidate(&mut self, id: Uuid) {
        if let Err(err) = self.conn.del::<_, ()>(Self::cache_key(id)).await {
            warn!(%err, subscription_id = %id, "failed to invalidate subscription cache entry");
        }
    }

    /// Cache-aside lookup: try the cache, fall through to the durable store
    /// on a miss, corrupt entry, or cache outage, and best-effort repopulate
    /// the cache afterward. Never returns a cache-specific error; the only
    /// error variant surfaced is a genuine durable-store failure.
    pub async fn get(&mut self, id: Uuid) -> Result<Option<Subscription>, sqlx::Error> {
        let key = Self::cache_key(id);

        match self.conn.get::<_, Option<String>>(&key).await {
            Ok(Some(json)) => match serde_json::from_str::<Subscription>(&json) {
                Ok(subscription) => {
                    debug!(subscription_id = %id, "subscription cache hit");
                    return Ok(Some(subscription));
                }
                Err(err) => {
                    warn!(%err, subscription_id = %id, "corrupt subscription cache entry, falling back to durable store");
                }
            },
            Ok(None) => {
                debug!(subscription_id = %id, "subscription cache miss");
            }
            Err(err) => {
                warn!(%err, subscription_id = %id, "subscription cache unreachable, falling back to durable store");
            }
        }

        let subscription = repository::fetch_subscription(&self.pool, id).await?;

        if let Some(subscription) = &subscription {
            self.cache(subscription).await;
        }

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_namespaced_by_id() {
        let id = Uuid::new_v4();
        let key = SubscriptionCache::cache_key(id);
        assert_eq!(key, format!("subscription:{id}"));
    }
}
