//! Redis cache backend

use super::CacheBackend;
use crate::error::CacheError;
use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

fn connection_error(err: ::redis::RedisError) -> CacheError {
    CacheError::Connection(err.to_string())
}

/// Durable backend over a multiplexed Redis connection
#[derive(Clone)]
pub struct RedisBackend {
    connection: MultiplexedConnection,
}

impl RedisBackend {
    /// Open a connection, failing fast when the server is unreachable
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = ::redis::Client::open(redis_url).map_err(connection_error)?;
        let connection = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Connection(format!("connect timed out after {:?}", CONNECT_TIMEOUT)))?
        .map_err(connection_error)?;
        debug!("Opened Redis connection");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(connection_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(connection_error)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await.map_err(connection_error)
    }
}
