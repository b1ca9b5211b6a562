use async_trait::async_trait;
use deadpool_redis::{redis, Config, Pool, Runtime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AuthError;

/// Live refresh tokens. An entry's existence is what keeps a refresh token usable.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn put(&self, refresh_token: &str, user_id: Uuid, ttl_secs: u64) -> Result<(), AuthError>;
    async fn get(&self, refresh_token: &str) -> Result<Option<Uuid>, AuthError>;
    /// Deleting an absent key is not an error.
    async fn delete(&self, refresh_token: &str) -> Result<(), AuthError>;
    /// Remaining lifetime in seconds, `None` when the key is gone.
    async fn ttl(&self, refresh_token: &str) -> Result<Option<u64>, AuthError>;
    async fn close(&self) {}
}

pub(crate) fn session_key(refresh_token: &str) -> String {
    format!("session:{refresh_token}")
}

/// Redis-backed registry; expiry is handled by `SET .. EX`.
#[derive(Clone)]
pub struct RedisSessionRegistry {
    pool: Pool,
}

impl RedisSessionRegistry {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let pool = Config::from_url(redis_url).create_pool(Some(Runtime::Tokio1))?;
        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, AuthError> {
        self.pool.get().await.map_err(|e| {
            warn!(error = %e, "redis pool unavailable");
            AuthError::ServiceUnavailable("redis")
        })
    }
}

fn map_redis(e: redis::RedisError) -> AuthError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        warn!(error = %e, "redis unavailable");
        AuthError::ServiceUnavailable("redis")
    } else {
        AuthError::Internal(anyhow::Error::new(e).context("redis command"))
    }
}

#[async_trait]
impl SessionRegistry for RedisSessionRegistry {
    async fn put(&self, refresh_token: &str, user_id: Uuid, ttl_secs: u64) -> Result<(), AuthError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(session_key(refresh_token))
            .arg(user_id.to_string())
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(map_redis)?;
        debug!(user_id = %user_id, ttl_secs, "session registered");
        Ok(())
    }

    async fn get(&self, refresh_token: &str) -> Result<Option<Uuid>, AuthError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(session_key(refresh_token))
            .query_async(&mut conn)
            .await
            .map_err(map_redis)?;
        value
            .map(|v| {
                Uuid::parse_str(&v)
                    .map_err(|e| AuthError::Internal(anyhow::anyhow!("corrupt session value: {e}")))
            })
            .transpose()
    }

    async fn delete(&self, refresh_token: &str) -> Result<(), AuthError> {
        let mut conn = self.conn().await?;
        let removed: i64 = redis::cmd("DEL")
            .arg(session_key(refresh_token))
            .query_async(&mut conn)
            .await
            .map_err(map_redis)?;
        debug!(removed, "session deleted");
        Ok(())
    }

    async fn ttl(&self, refresh_token: &str) -> Result<Option<u64>, AuthError> {
        let mut conn = self.conn().await?;
        let secs: i64 = redis::cmd("TTL")
            .arg(session_key(refresh_token))
            .query_async(&mut conn)
            .await
            .map_err(map_redis)?;
        // -2: missing key, -1: key without expiry
        Ok(u64::try_from(secs).ok())
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(session_key("abc.def"), "session:abc.def");
    }
}
